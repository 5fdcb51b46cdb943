//! 实时同步演示
//!
//! 连接服务端、加载会话、订阅推送并打印班级状态变化。
//!
//! ```bash
//! SCHOOL_API=http://127.0.0.1:8080 SCHOOL_TOKEN=xxx cargo run --example realtime_demo
//! ```

use school_sync_sdk::{
    HttpClassApi, LifecycleManager, SyncConfig, SyncController, SyncEvent, DEFAULT_API_BASE_URL,
    SDK_VERSION,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n🚀 班级状态实时同步演示 (SDK {})\n", SDK_VERSION);

    let base_url = std::env::var("SCHOOL_API").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
    let mut builder = SyncConfig::builder().api_base_url(base_url);
    if let Ok(token) = std::env::var("SCHOOL_TOKEN") {
        builder = builder.token(token);
    }
    let config = builder.build();

    let api = Arc::new(HttpClassApi::new(&config)?);
    let controller = SyncController::initialize(config, api).await?;

    let mut lifecycle = LifecycleManager::new();
    lifecycle.register_hook(controller.clone());

    controller.event_manager().add_listener("*", |event| match event {
        SyncEvent::ConnectionStateChanged { old_state, new_state, .. } => {
            println!("📡 连接状态: {} -> {}", old_state, new_state);
        }
        SyncEvent::ClassStatusChanged {
            class_id,
            old_status,
            new_status,
            source,
            ..
        } => {
            println!("🏫 班级 {}: {} -> {} ({:?})", class_id, old_status, new_status, source);
        }
        SyncEvent::StatusWriteFailed { class_id, error, .. } => {
            println!("❌ 班级 {} 修改失败: {}", class_id, error);
        }
        SyncEvent::FrameDropped { reason, .. } => {
            println!("⚠️ 丢弃推送: {}", reason);
        }
    });

    let user = controller.load_session().await?;
    println!("👤 {} 负责 {} 个班级", user.username, user.class_infos.len());
    for class in controller.classes() {
        println!("   - [{}] {} : {}", class.id, class.name, class.status);
    }

    // 运行一段时间，观察推送
    tokio::time::sleep(Duration::from_secs(30)).await;

    // 模拟切到后台再回来
    lifecycle.notify_background().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    lifecycle.notify_foreground().await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    if let Some(stats) = controller.connection_stats() {
        println!("\n{}", stats.summary(controller.connection_state()));
    }

    lifecycle.notify_unload().await?;
    controller.shutdown().await;
    println!("\n✅ 演示结束");
    Ok(())
}
