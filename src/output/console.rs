// 该文件是 Fengfan （风帆） 项目的一部分。
// src/output/console.rs - 控制台表格输出
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

use std::{convert::Infallible, fmt::Write};

use crate::{
  output::Render,
  task::{BenchmarkTable, ConsistencyReport},
};

#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

pub(crate) fn format_benchmark(table: &BenchmarkTable) -> String {
  let mut text = String::new();
  let _ = writeln!(
    text,
    "{:>10} | {:>14} | {:>14}",
    "batch", table.backends[0], table.backends[1]
  );
  let _ = writeln!(text, "{:-<10}-+-{:-<14}-+-{:-<14}", "", "", "");
  for (batch, pair) in &table.rows {
    let _ = writeln!(
      text,
      "{:>10} | {:>12.3}us | {:>12.3}us",
      batch,
      pair.first * 1e6,
      pair.second * 1e6
    );
  }
  text
}

pub(crate) fn format_consistency(report: &ConsistencyReport) -> String {
  format!(
    "{} vs {}: {} 个样本, 标签匹配率 {:.4}, 最大概率差 {:e} (容差 {:e}) => {}",
    report.backends[0],
    report.backends[1],
    report.samples,
    report.label_match,
    report.max_abs_diff,
    report.tolerance,
    if report.passed { "通过" } else { "未通过" }
  )
}

impl Render<BenchmarkTable> for ConsoleOutput {
  type Error = Infallible;

  fn render_result(&self, result: &BenchmarkTable) -> Result<(), Self::Error> {
    println!();
    println!("平均单次推理延迟 (重复 {} 次):", result.repeat);
    print!("{}", format_benchmark(result));
    Ok(())
  }
}

impl Render<ConsistencyReport> for ConsoleOutput {
  type Error = Infallible;

  fn render_result(&self, result: &ConsistencyReport) -> Result<(), Self::Error> {
    println!("{}", format_consistency(result));
    Ok(())
  }
}
