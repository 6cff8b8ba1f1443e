// 声明模块结构：
// `application`: 启动与关闭流程。
// `state`: 启动完成后各组件共享的状态。
mod application;
mod state;

// 仅在测试配置下编译 `tests` 模块。
#[cfg(test)]
mod tests;

use std::io;

#[tokio::main]
async fn main() -> io::Result<()> {
    // 启动失败时打印一行诊断信息，并以非零状态码退出。
    if let Err(err) = application::run().await {
        eprintln!("[svcboot] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}
