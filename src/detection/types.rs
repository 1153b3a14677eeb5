// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测结果数据结构
use serde::{Deserialize, Serialize};
use std::fmt;

/// 检测框 (原图像素坐标)
///
/// 解码阶段不强制 `x1 <= x2, y1 <= y2`, 退化框的面积按 0 计算
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 由中心点和宽高构造
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.,
            y1: cy - h / 2.,
            x2: cx + w / 2.,
            y2: cy + h / 2.,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.) * self.height().max(0.)
    }

    pub fn intersection_area(&self, another: &BBox) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        // 不相交时宽高为负, 必须先截断到 0 再相乘
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &BBox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    /// 交并比, 取值 [0, 1]
    pub fn iou(&self, another: &BBox) -> f32 {
        let union = self.union(another);
        if union > 0. {
            (self.intersection_area(another) / union).clamp(0., 1.)
        } else {
            0.
        }
    }
}

/// 单个检测结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox, class_id: usize, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            label: label.into(),
            confidence,
        }
    }

    pub fn iou(&self, another: &Detection) -> f32 {
        self.bbox.iou(&another.bbox)
    }
}

impl fmt::Display for Detection {
    /// `person (90%): [270, 270, 370, 370]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}%): [{}, {}, {}, {}]",
            self.label,
            round_half_up(self.confidence * 100.),
            round_half_up(self.bbox.x1),
            round_half_up(self.bbox.y1),
            round_half_up(self.bbox.x2),
            round_half_up(self.bbox.y2),
        )
    }
}

/// .5 向正无穷取整 (-2.5 → -2, 2.5 → 3)
fn round_half_up(v: f32) -> f32 {
    (v + 0.5).floor()
}

/// 没有检测结果时的提示
pub const NO_OBJECTS: &str = "No objects detected";

/// 把检测结果格式化为多行文本, 每行一个目标
pub fn format_detections(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return NO_OBJECTS.to_string();
    }
    detections
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iou_self_is_one() {
        let b = BBox::new(10., 20., 110., 70.);
        assert_relative_eq!(b.iou(&b), 1.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = BBox::new(0., 0., 10., 10.);
        let b = BBox::new(5., 5., 20., 15.);
        assert_relative_eq!(a.iou(&b), b.iou(&a));
        // 交 25, 并 100 + 150 - 25
        assert_relative_eq!(a.iou(&b), 25. / 225.);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        // x 方向和 y 方向都不相交, 未截断时两个负数相乘会得到正的 "面积"
        let a = BBox::new(0., 0., 10., 10.);
        let b = BBox::new(20., 20., 30., 30.);
        assert_eq!(a.intersection_area(&b), 0.);
        assert_eq!(a.iou(&b), 0.);
    }

    #[test]
    fn test_iou_degenerate_boxes() {
        let a = BBox::new(10., 10., 5., 5.);
        let b = BBox::new(0., 0., 20., 20.);
        assert_eq!(a.area(), 0.);
        let iou = a.iou(&b);
        assert!((0. ..=1.).contains(&iou));
        assert_eq!(a.iou(&a), 0.);
    }

    #[test]
    fn test_from_cxcywh() {
        let b = BBox::from_cxcywh(320., 320., 100., 100.);
        assert_eq!(b, BBox::new(270., 270., 370., 370.));
        assert_relative_eq!(b.area(), 10000.);
    }

    #[test]
    fn test_display() {
        let d = Detection::new(BBox::new(269.6, 270.2, 370.4, 369.5), 0, "person", 0.874);
        assert_eq!(d.to_string(), "person (87%): [270, 270, 370, 370]");
    }

    #[test]
    fn test_display_negative_edges() {
        let d = Detection::new(BBox::new(-2.5, -0.4, 3.5, 10.5), 1, "bicycle", 0.5);
        assert_eq!(d.to_string(), "bicycle (50%): [-2, 0, 4, 11]");
    }

    #[test]
    fn test_format_detections() {
        assert_eq!(format_detections(&[]), NO_OBJECTS);
        let dets = vec![
            Detection::new(BBox::new(0., 0., 10., 10.), 2, "car", 0.9),
            Detection::new(BBox::new(20., 20., 30., 30.), 16, "dog", 0.6),
        ];
        assert_eq!(
            format_detections(&dets),
            "car (90%): [0, 0, 10, 10]\ndog (60%): [20, 20, 30, 30]"
        );
    }
}
