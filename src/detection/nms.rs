// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 贪心非极大值抑制 (与类别无关)

use super::types::Detection;

/// 原地 NMS: 按置信度降序排列, 与已保留框 IoU >= `iou_threshold` 的框被丢弃
///
/// 不区分类别: 不同类别的框重叠足够多时同样会互相抑制
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    // 稳定排序, 置信度相同时保持解码顺序
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].iou(&xs[index]) >= iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 返回去重后的新列表, 按置信度降序
pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    non_max_suppression(&mut detections, iou_threshold);
    detections
}
