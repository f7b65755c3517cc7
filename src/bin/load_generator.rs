use clap::Parser;
use rand::Rng;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use topmoves_service::infrastructure::network::{ClientError, FrontDoorClient};
use topmoves_service::shared::protocol::{PieceToken, Status, TopMovesQuery};

// 中局棋盘：右侧留井，左侧有坑
const SAMPLE_BOARD: &str = "00000000000000000000000000000000000000000000000000000000000000000011100000001110000000111100000111110000011110000011111100011101110011101110001111111000111111100111111110011111111001111111101111111110";

/// 并发负载测试
#[derive(Parser, Debug)]
#[command(name = "load_generator")]
#[command(about = "Concurrent load test for the top-moves front door", long_about = None)]
struct Args {
    /// 帧协议前门地址
    #[arg(short, long, default_value = "127.0.0.1:4501")]
    addr: SocketAddr,

    /// 依次测试的并发客户端数量
    #[arg(short, long, value_delimiter = ',', default_value = "1,5,10,20")]
    clients: Vec<usize>,

    /// 每个客户端在同一连接上发送的请求数
    #[arg(short, long, default_value_t = 1)]
    requests: usize,

    /// 搜索深度
    #[arg(long, default_value_t = 3)]
    depth: u32,

    /// 每个候选的playout次数
    #[arg(long, default_value_t = 343)]
    playout_count: u32,
}

/// 单个客户端的结果
#[derive(Default)]
struct ClientStats {
    latencies: Vec<Duration>,
    errors: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    println!("启动负载测试...");
    println!("服务器地址: {}", args.addr);
    println!("每客户端请求数: {}", args.requests);

    for &clients in &args.clients {
        run_round(&args, clients).await;
    }
}

async fn run_round(args: &Args, clients: usize) {
    let started = Instant::now();
    let mut handles = Vec::with_capacity(clients);

    for client_id in 0..clients {
        let addr = args.addr;
        let requests = args.requests;
        let depth = args.depth;
        let playout_count = args.playout_count;
        handles.push(tokio::spawn(async move {
            match run_client(addr, requests, depth, playout_count).await {
                Ok(stats) => stats,
                Err(e) => {
                    eprintln!("[客户端 {}] 失败: {}", client_id, e);
                    ClientStats {
                        errors: requests,
                        ..Default::default()
                    }
                }
            }
        }));
    }

    let mut latencies = Vec::new();
    let mut errors = 0;
    for handle in handles {
        match handle.await {
            Ok(stats) => {
                latencies.extend(stats.latencies);
                errors += stats.errors;
            }
            Err(e) => eprintln!("客户端任务异常: {}", e),
        }
    }
    let total = started.elapsed();

    latencies.sort();
    let percentile = |p: f64| -> Duration {
        if latencies.is_empty() {
            return Duration::ZERO;
        }
        let index = ((latencies.len() as f64 * p).ceil() as usize).saturating_sub(1);
        latencies[index.min(latencies.len() - 1)]
    };
    let completed = latencies.len();
    let average = if completed > 0 {
        latencies.iter().sum::<Duration>() / completed as u32
    } else {
        Duration::ZERO
    };

    println!("\n--- {} 个并发客户端 ---", clients);
    println!("总耗时: {:.4} s", total.as_secs_f64());
    println!("成功/失败: {}/{}", completed, errors);
    println!("吞吐量: {:.2} req/s", completed as f64 / total.as_secs_f64());
    println!("平均延迟: {:.2} ms", average.as_secs_f64() * 1000.0);
    println!("p50: {:.2} ms  p99: {:.2} ms  max: {:.2} ms",
        percentile(0.50).as_secs_f64() * 1000.0,
        percentile(0.99).as_secs_f64() * 1000.0,
        percentile(1.0).as_secs_f64() * 1000.0,
    );
    println!("{}", "-".repeat(50));
}

async fn run_client(
    addr: SocketAddr,
    requests: usize,
    depth: u32,
    playout_count: u32,
) -> Result<ClientStats, ClientError> {
    let mut client = FrontDoorClient::connect(addr).await?;
    let mut stats = ClientStats::default();

    for _ in 0..requests {
        let (current, next) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(0..7u32), rng.gen_range(0..7u32))
        };
        let query = TopMovesQuery {
            board: SAMPLE_BOARD.to_string(),
            current_piece: PieceToken::Index(current),
            next_piece: Some(PieceToken::Index(next)),
            depth: Some(depth),
            playout_count: Some(playout_count),
            ..Default::default()
        };

        let start = Instant::now();
        let response = client.top_moves(query).await?;
        if response.status == Status::Ok {
            stats.latencies.push(start.elapsed());
        } else {
            stats.errors += 1;
            if let Some(error) = response.error {
                eprintln!("请求失败: {:?} {}", error.code, error.message);
            }
        }
    }

    Ok(stats)
}
