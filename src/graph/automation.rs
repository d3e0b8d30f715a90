// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// How a point is reached from the previous point.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Ramp {
    /// Jump to the value at the point's time.
    Step,
    /// Interpolate linearly from the previous point.
    Linear,
    /// Interpolate exponentially from the previous point. Both endpoint
    /// values must be positive; a non-positive start degrades to linear.
    Exponential,
}

#[derive(Clone, Copy, Debug)]
struct Point {
    at: u64,
    value: f32,
    ramp: Ramp,
}

/// A parameter value automated over time. Times are absolute sample positions
/// on the bus clock. Points must be appended in non-decreasing time order;
/// before the first point the initial value holds, after the last point the
/// final value holds.
#[derive(Clone, Debug)]
pub struct Automation {
    initial: f32,
    points: Vec<Point>,
}

impl Automation {
    /// Creates an automation holding a constant value.
    pub fn new(initial: f32) -> Automation {
        Automation {
            initial,
            points: Vec::new(),
        }
    }

    /// Sets the value instantaneously at the given time.
    pub fn set_value_at(&mut self, value: f32, at: u64) -> &mut Automation {
        self.push(Point {
            at,
            value,
            ramp: Ramp::Step,
        });
        self
    }

    /// Ramps linearly from the previous point to the given value.
    pub fn linear_ramp_to(&mut self, value: f32, at: u64) -> &mut Automation {
        self.push(Point {
            at,
            value,
            ramp: Ramp::Linear,
        });
        self
    }

    /// Ramps exponentially from the previous point to the given value. The
    /// target is floored away from zero so the curve stays defined.
    pub fn exponential_ramp_to(&mut self, value: f32, at: u64) -> &mut Automation {
        self.push(Point {
            at,
            value: value.max(MIN_EXPONENTIAL_TARGET),
            ramp: Ramp::Exponential,
        });
        self
    }

    /// Replaces the entire schedule with a linear ramp from the current value
    /// at `now` to `value` at `at`. Used for live retargeting of a parameter
    /// that already has automation on it.
    pub fn linear_ramp_from_current(&mut self, value: f32, now: u64, at: u64) {
        let current = self.value_at(now);
        self.points.clear();
        self.initial = current;
        self.set_value_at(current, now);
        self.linear_ramp_to(value, at.max(now + 1));
    }

    /// Evaluates the automation at the given time.
    pub fn value_at(&self, at: u64) -> f32 {
        // The point lists here are tiny (voice envelopes are at most four
        // points), so a linear scan beats anything clever.
        let mut prev_at = 0u64;
        let mut prev_value = self.initial;

        for point in self.points.iter() {
            if at >= point.at {
                prev_at = point.at;
                prev_value = point.value;
                continue;
            }

            return match point.ramp {
                Ramp::Step => prev_value,
                Ramp::Linear => {
                    let span = (point.at - prev_at) as f32;
                    let progress = (at - prev_at) as f32 / span;
                    prev_value + (point.value - prev_value) * progress
                }
                Ramp::Exponential => {
                    if prev_value <= 0.0 {
                        let span = (point.at - prev_at) as f32;
                        let progress = (at - prev_at) as f32 / span;
                        return prev_value + (point.value - prev_value) * progress;
                    }
                    let span = (point.at - prev_at) as f32;
                    let progress = (at - prev_at) as f32 / span;
                    prev_value * (point.value / prev_value).powf(progress)
                }
            };
        }

        prev_value
    }

    fn push(&mut self, point: Point) {
        // Keep the list ordered even if a caller stamps a point earlier than
        // the tail; the late point wins from its own time onward.
        let at = point.at;
        self.points.retain(|p| p.at <= at);
        self.points.push(point);
    }
}

const MIN_EXPONENTIAL_TARGET: f32 = 1.0e-6;
