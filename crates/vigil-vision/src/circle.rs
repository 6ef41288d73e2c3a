//! Minimum enclosing circle (randomized incremental, Welzl).

use rand::seq::SliceRandom;

const EPS: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
}

#[derive(Clone, Copy)]
struct C {
    x: f64,
    y: f64,
    r: f64,
}

impl C {
    fn contains(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.x;
        let dy = p.1 - self.y;
        (dx * dx + dy * dy).sqrt() <= self.r + EPS
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let x = (a.0 + b.0) / 2.0;
        let y = (a.1 + b.1) / 2.0;
        let r = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() / 2.0;
        C { x, y, r }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let bx = b.0 - a.0;
        let by = b.1 - a.1;
        let cx = c.0 - a.0;
        let cy = c.1 - a.1;
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < EPS {
            // Collinear: the widest pair spans the other point.
            let candidates = [C::from_two(a, b), C::from_two(a, c), C::from_two(b, c)];
            return candidates
                .into_iter()
                .fold(C { x: a.0, y: a.1, r: 0.0 }, |best, cand| {
                    if cand.r > best.r {
                        cand
                    } else {
                        best
                    }
                });
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        C {
            x: a.0 + ux,
            y: a.1 + uy,
            r: (ux * ux + uy * uy).sqrt(),
        }
    }
}

/// Smallest circle containing every point. `None` for an empty input.
pub fn min_enclosing_circle(points: &[(f32, f32)]) -> Option<Circle> {
    let mut pts: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
    pts.shuffle(&mut rand::thread_rng());
    let first = *pts.first()?;

    let mut c = C {
        x: first.0,
        y: first.1,
        r: 0.0,
    };
    for i in 1..pts.len() {
        if c.contains(pts[i]) {
            continue;
        }
        c = C {
            x: pts[i].0,
            y: pts[i].1,
            r: 0.0,
        };
        for j in 0..i {
            if c.contains(pts[j]) {
                continue;
            }
            c = C::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !c.contains(pts[k]) {
                    c = C::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }

    Some(Circle {
        cx: c.x as f32,
        cy: c.y as f32,
        radius: c.r as f32,
    })
}
