// 该文件是 Fengfan （风帆） 项目的一部分。
// src/bin/score_server.rs - HTTP 评分服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{net::SocketAddr, sync::Arc, thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use fengfan::{frame::Preprocess, scoring::Scorer, server::serve};

/// Fengfan 评分服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径，例如 onnx:///models/sports.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 监听地址
  #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:5001")]
  pub listen: SocketAddr,
  /// 预处理时做水平翻转
  #[arg(long, default_value_t = false)]
  pub flip: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("监听地址: {}", args.listen);

  let scorer = Arc::new(Scorer::init(
    &args.model,
    Preprocess::default().with_flip(args.flip),
  )?);

  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()?;
  runtime.block_on(serve(Arc::clone(&scorer), args.listen, async move {
    let _ = tokio::task::spawn_blocking(move || rx.recv()).await;
  }))?;
  drop(runtime);

  // 阻塞 HTTP 客户端须在异步运行时之外释放
  drop(scorer);
  info!("服务退出");

  Ok(())
}
