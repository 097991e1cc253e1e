//! 带体素分辨率的精确欧氏距离变换.
//!
//! 采用可分离的下包络线算法 (Felzenszwalb & Huttenlocher, 2012):
//! 三维平方距离可以沿三个坐标轴依次做一维变换得到, 每次变换的代价为 O(n).
//! 体素间距直接代入抛物线顶点的物理坐标, 因此各向异性体素无需额外处理.

use ndarray::{Array3, ArrayView3, ArrayViewMut1, Axis};

/// 一维平方距离变换的工作区. 每条 lane 复用一份, 避免反复分配.
#[derive(Default)]
struct Envelope {
    /// 下包络线上各抛物线的顶点下标.
    v: Vec<usize>,

    /// 第 `k` 条抛物线在下包络线上的左边界 (物理坐标).
    z: Vec<f64>,

    /// 输入代价的拷贝 (lane 可能不连续).
    f: Vec<f64>,
}

impl Envelope {
    /// 对 `lane` 原地做一维平方距离变换.
    ///
    /// 输入 `lane[q]` 为位置 `q` 的代价, `f64::INFINITY` 表示该位置不是源点.
    /// 输出 `lane[p] = min_q ((p - q) * spacing)^2 + lane[q]`. 无源点时全为无穷大.
    fn transform(&mut self, mut lane: ArrayViewMut1<'_, f64>, spacing: f64) {
        self.f.clear();
        self.f.extend(lane.iter().copied());
        self.v.clear();
        self.z.clear();

        let f = &self.f;
        let pos = |q: usize| q as f64 * spacing;
        // 抛物线 p 与 q 交点的物理坐标.
        let intersect = |p: usize, q: usize| {
            let (xp, xq) = (pos(p), pos(q));
            ((f[q] + xq * xq) - (f[p] + xp * xp)) / (2.0 * (xq - xp))
        };

        for q in (0..f.len()).filter(|&q| f[q].is_finite()) {
            let mut s = f64::NEG_INFINITY;
            while let Some(&p) = self.v.last() {
                s = intersect(p, q);
                if s > self.z[self.z.len() - 1] {
                    break;
                }
                self.v.pop();
                self.z.pop();
                s = f64::NEG_INFINITY;
            }
            self.v.push(q);
            self.z.push(s);
        }

        if self.v.is_empty() {
            lane.fill(f64::INFINITY);
            return;
        }

        let mut k = 0;
        for (p, out) in lane.iter_mut().enumerate() {
            let xp = pos(p);
            while k + 1 < self.v.len() && self.z[k + 1] < xp {
                k += 1;
            }
            let d = xp - pos(self.v[k]);
            *out = d * d + f[self.v[k]];
        }
    }
}

/// 沿 `axis` 对 `field` 的每条 lane 做一维变换.
///
/// 按另一坐标轴切成平面, 每个平面内的 lane 共用一份 [`Envelope`].
fn transform_axis(field: &mut Array3<f64>, axis: usize, spacing: f64) {
    let outer = if axis == 0 { 1 } else { 0 };
    // 切片后 lane 所在轴的下标.
    let inner = if axis > outer { axis - 1 } else { axis };
    let planes = field.axis_iter_mut(Axis(outer));
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};
            planes
                .into_par_iter()
                .for_each_init(Envelope::default, |env, mut plane| {
                    for lane in plane.lanes_mut(Axis(inner)) {
                        env.transform(lane, spacing);
                    }
                });
        } else {
            let mut env = Envelope::default();
            for mut plane in planes {
                for lane in plane.lanes_mut(Axis(inner)) {
                    env.transform(lane, spacing);
                }
            }
        }
    }
}

/// 计算每个体素到最近的源体素 (`is_source` 为真) 中心的平方欧氏距离, 单位为 (mm)^2.
///
/// `spacing` 按 `[z, H, W]` 给出. 不存在源体素时结果全为 `f64::INFINITY`.
pub fn squared_distance<T, F>(data: ArrayView3<'_, T>, spacing: [f64; 3], is_source: F) -> Array3<f64>
where
    F: Fn(&T) -> bool,
{
    let mut field = data.map(|p| if is_source(p) { 0.0 } else { f64::INFINITY });
    for (axis, &s) in spacing.iter().enumerate() {
        transform_axis(&mut field, axis, s);
    }
    field
}
