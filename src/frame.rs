// 该文件是 Fengfan （风帆） 项目的一部分。
// src/frame.rs - NCHW 张量帧定义与预处理
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

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use tracing::debug;

const RGB_CHANNELS: usize = 3;

/// ImageNet 通道均值
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet 通道标准差
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 归一化后的 NCHW 浮点帧（批大小固定为 1）
#[derive(Debug, Clone)]
pub struct NormalizedNchwFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> Default for NormalizedNchwFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    Self {
      data: vec![0f32; size].into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> NormalizedNchwFrame<W, H> {
  /// 张量形状 `[1, C, H, W]`
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, H as usize, W as usize]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, c: usize, h: usize, w: usize) -> f32 {
    self.data[c * (H as usize) * (W as usize) + h * (W as usize) + w]
  }
}

impl<const W: u32, const H: u32> AsMut<[f32]> for NormalizedNchwFrame<W, H> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

/// 推理前的确定性预处理：缩放短边、中心裁剪、可选水平翻转、按通道归一化。
///
/// 不做随机裁剪与随机翻转，同一张图像总是得到同一个张量。
#[derive(Debug, Clone)]
pub struct Preprocess {
  pub resize: u32,
  pub flip: bool,
  pub mean: [f32; 3],
  pub std: [f32; 3],
}

impl Default for Preprocess {
  fn default() -> Self {
    Self {
      resize: 256,
      flip: false,
      mean: IMAGENET_MEAN,
      std: IMAGENET_STD,
    }
  }
}

impl Preprocess {
  pub fn with_flip(mut self, flip: bool) -> Self {
    self.flip = flip;
    self
  }

  pub fn apply<const W: u32, const H: u32>(&self, image: &RgbImage) -> NormalizedNchwFrame<W, H> {
    let (src_w, src_h) = image.dimensions();
    let resize = self.resize.max(W).max(H) as u64;

    // 短边缩放到 resize 后再中心裁剪 W x H，等价于先在原图上裁出对应窗口再缩放，
    // 缩放结果大小与原图纵横比无关
    let side = src_w.min(src_h) as u64;
    let crop_w = ((side * W as u64) / resize).clamp(1, src_w.max(1) as u64) as u32;
    let crop_h = ((side * H as u64) / resize).clamp(1, src_h.max(1) as u64) as u32;
    let x = (src_w.saturating_sub(crop_w)) / 2;
    let y = (src_h.saturating_sub(crop_h)) / 2;
    debug!(
      "预处理裁剪: {}x{} 中心 {}x{} -> {}x{}",
      src_w, src_h, crop_w, crop_h, W, H
    );
    let window = imageops::crop_imm(image, x, y, crop_w, crop_h).to_image();
    let mut cropped = imageops::resize(&window, W, H, FilterType::Triangle);
    if self.flip {
      cropped = imageops::flip_horizontal(&cropped);
    }

    let mut frame = NormalizedNchwFrame::<W, H>::default();
    let slice = frame.as_mut();
    let plane = (W as usize) * (H as usize);
    for (w, h, pixel) in cropped.enumerate_pixels() {
      let offset = (h as usize) * (W as usize) + (w as usize);
      for c in 0..RGB_CHANNELS {
        let value = pixel[c] as f32 / 255.0;
        slice[c * plane + offset] = (value - self.mean[c]) / self.std[c];
      }
    }
    frame
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn test_preprocess_shape_and_normalization() {
    let image = RgbImage::from_pixel(320, 240, Rgb([255, 0, 128]));
    let frame: NormalizedNchwFrame<224, 224> = Preprocess::default().apply(&image);

    assert_eq!(frame.shape(), [1, 3, 224, 224]);
    assert_eq!(frame.as_slice().len(), 3 * 224 * 224);

    let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
    let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
    assert!((frame.get(0, 100, 100) - red).abs() < 0.02);
    assert!((frame.get(1, 10, 200) - green).abs() < 0.02);
  }

  #[test]
  fn test_preprocess_is_deterministic() {
    let image = RgbImage::from_fn(300, 400, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]));
    let pre = Preprocess::default();
    let a: NormalizedNchwFrame<224, 224> = pre.apply(&image);
    let b: NormalizedNchwFrame<224, 224> = pre.apply(&image);
    assert_eq!(a.as_slice(), b.as_slice());
  }

  #[test]
  fn test_preprocess_flip_mirrors_columns() {
    let image = RgbImage::from_fn(256, 256, |x, _| Rgb([x as u8, 0, 0]));
    let plain: NormalizedNchwFrame<224, 224> = Preprocess::default().apply(&image);
    let flipped: NormalizedNchwFrame<224, 224> = Preprocess::default().with_flip(true).apply(&image);
    assert_eq!(plain.get(0, 5, 0), flipped.get(0, 5, 223));
    assert_eq!(plain.get(0, 5, 223), flipped.get(0, 5, 0));
  }

  #[test]
  fn test_preprocess_center_window_matches_short_side_resize() {
    // 512x512 缩放到 256 后中心裁剪 224，对应原图中心 448x448
    let image = RgbImage::from_fn(512, 512, |x, _| {
      if (32..480).contains(&x) {
        Rgb([255, 255, 255])
      } else {
        Rgb([0, 0, 0])
      }
    });
    let frame: NormalizedNchwFrame<224, 224> = Preprocess::default().apply(&image);
    let white = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
    assert!((frame.get(0, 112, 0) - white).abs() < 0.02);
    assert!((frame.get(0, 112, 223) - white).abs() < 0.02);
  }

  #[test]
  fn test_preprocess_extreme_aspect_ratio() {
    let image = RgbImage::from_pixel(20000, 1, Rgb([0, 255, 0]));
    let frame: NormalizedNchwFrame<224, 224> = Preprocess::default().apply(&image);
    assert_eq!(frame.shape(), [1, 3, 224, 224]);
    let green = (1.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
    assert!((frame.get(1, 200, 3) - green).abs() < 0.02);

    let tall = RgbImage::from_pixel(2, 50000, Rgb([0, 0, 0]));
    let frame: NormalizedNchwFrame<224, 224> = Preprocess::default().apply(&tall);
    assert_eq!(frame.as_slice().len(), 3 * 224 * 224);
  }
}
