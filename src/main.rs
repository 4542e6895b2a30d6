//! Service Notifier CLI
//!
//! 监控服务健康、模型状态和实时事件，并输出通知

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use service_notifier::{
    build_store, ApiClient, ApiConfig, NotificationService, PromptState, ServiceConfig,
};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "snotify")]
#[command(about = "Service Notifier - 监控服务状态并输出通知")]
#[command(version)]
struct Cli {
    /// 服务地址（覆盖配置文件和环境变量）
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动全部监控，按 Ctrl+C 停止
    Watch {
        /// 禁用健康检查
        #[arg(long)]
        no_connectivity: bool,
        /// 禁用模型状态轮询
        #[arg(long)]
        no_resources: bool,
        /// 禁用实时事件流
        #[arg(long)]
        no_realtime: bool,
        /// 转发重要通知到系统通知中心
        #[arg(long)]
        desktop: bool,
        /// 每条通知输出一行 JSON
        #[arg(long)]
        json: bool,
    },
    /// 执行一次健康检查和模型状态查询
    Check {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 输出当前生效的配置
    Config,
    /// 查看或关闭安装提示
    Prompt {
        /// 记录关闭（7 天内不再提示）
        #[arg(long)]
        dismiss: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("service_notifier=info,snotify=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let mut config = ServiceConfig::auto_load()?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    match cli.command {
        Commands::Watch {
            no_connectivity,
            no_resources,
            no_realtime,
            desktop,
            json,
        } => {
            config.enable_connectivity &= !no_connectivity;
            config.enable_resources &= !no_resources;
            config.enable_realtime &= !no_realtime;
            config.desktop_notifications |= desktop;

            let store = build_store(&config);
            let seen = Mutex::new(HashSet::new());
            let printer = store.subscribe(move |list| {
                let mut seen = seen.lock().unwrap_or_else(|e| e.into_inner());
                // 保留仍在列表中的 id，避免集合无限增长
                seen.retain(|id: &String| list.iter().any(|n| &n.id == id));
                for n in list.iter().rev() {
                    if !seen.insert(n.id.clone()) {
                        continue;
                    }
                    if json {
                        match serde_json::to_string(n) {
                            Ok(line) => println!("{}", line),
                            Err(e) => eprintln!("序列化通知失败: {}", e),
                        }
                    } else {
                        println!(
                            "[{}] {} {} - {}",
                            n.timestamp.format("%H:%M:%S"),
                            n.kind.as_str().to_uppercase(),
                            n.title,
                            n.message
                        );
                    }
                }
            });

            eprintln!("开始监控 {} (按 Ctrl+C 停止)", config.base_url);
            let service = NotificationService::start(&config, store)?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            printer.unsubscribe();
            service.shutdown().await;
        }
        Commands::Check { json } => {
            let client = ApiClient::new(ApiConfig {
                base_url: config.base_url.clone(),
                timeout_secs: config.request_timeout_secs,
            })?;

            let health = client.health().await;
            let models = client.models_status().await;

            if json {
                let output = serde_json::json!({
                    "base_url": config.base_url,
                    "healthy": health.is_ok(),
                    "health_error": health.as_ref().err().map(|e| e.to_string()),
                    "models": models.as_ref().ok(),
                    "models_error": models.as_ref().err().map(|e| e.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                match &health {
                    Ok(()) => println!("服务状态: 在线 ({})", config.base_url),
                    Err(e) => println!("服务状态: 离线 ({}) - {}", config.base_url, e),
                }
                match &models {
                    Ok(models) => {
                        println!("发现 {} 个模型:\n", models.len());
                        for (id, status) in models {
                            println!(
                                "  {} | 名称: {} | 可用: {} | 负载: {}%",
                                id,
                                status.name,
                                if status.available { "是" } else { "否" },
                                status.load
                            );
                        }
                    }
                    Err(e) => println!("模型状态查询失败: {}", e),
                }
            }
        }
        Commands::Config => {
            println!("# {}", ServiceConfig::path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Prompt { dismiss } => {
            let state = PromptState::new();
            let now = Utc::now();
            if dismiss {
                state.dismiss(now)?;
                println!("已关闭安装提示，7 天内不再显示");
            } else if state.should_prompt(now) {
                println!("应显示安装提示");
            } else if let Some(at) = state.dismissed_at() {
                println!("安装提示已于 {} 关闭", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }

    Ok(())
}
