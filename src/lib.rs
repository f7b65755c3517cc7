// 全局内存分配器：使用 jemalloc
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

// 分层架构
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;
