//! Planned paths and waypoint playback state.
//!
//! A [`PlannedPath`] comes from an external motion planner as a list of
//! [`Waypoint`]s, each sampled one control period apart.  [`Playback`]
//! walks a path one waypoint per tick.

use serde::{Deserialize, Serialize};

/// One control-period sample of a planned motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Joint goals in group order.  Empty leaves the joints where they are.
    #[serde(default)]
    pub joints_rad: Vec<f64>,
    /// Tool goal, if the tool moves on this sample.
    #[serde(default)]
    pub tool_rad: Option<f64>,
}

impl Waypoint {
    pub fn joints(joints_rad: Vec<f64>) -> Self {
        Self {
            joints_rad,
            tool_rad: None,
        }
    }

    pub fn tool(tool_rad: f64) -> Self {
        Self {
            joints_rad: Vec::new(),
            tool_rad: Some(tool_rad),
        }
    }
}

/// An ordered list of waypoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlannedPath {
    pub waypoints: Vec<Waypoint>,
}

impl PlannedPath {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Index of the first waypoint whose joint vector is neither empty nor
    /// `joint_count` wide.
    pub fn first_bad_width(&self, joint_count: usize) -> Option<(usize, usize)> {
        self.waypoints.iter().enumerate().find_map(|(i, w)| {
            let n = w.joints_rad.len();
            (n != 0 && n != joint_count).then_some((i, n))
        })
    }
}

/// Cursor over the path being executed.
#[derive(Debug, Default)]
pub struct Playback {
    path: PlannedPath,
    next: usize,
}

impl Playback {
    pub fn start(&mut self, path: PlannedPath) {
        self.path = path;
        self.next = 0;
    }

    /// A plan is loaded and has waypoints left.
    pub fn is_moving(&self) -> bool {
        self.next < self.path.len()
    }

    /// Take the next waypoint, advancing the cursor.
    pub fn advance(&mut self) -> Option<&Waypoint> {
        let waypoint = self.path.waypoints.get(self.next)?;
        self.next += 1;
        Some(waypoint)
    }

    /// Waypoints not yet emitted.
    pub fn remaining(&self) -> usize {
        self.path.len().saturating_sub(self.next)
    }

    pub fn cancel(&mut self) {
        self.path = PlannedPath::default();
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_walks_each_waypoint_once() {
        let mut playback = Playback::default();
        assert!(!playback.is_moving());
        playback.start(PlannedPath::new(vec![
            Waypoint::joints(vec![0.0, 0.1]),
            Waypoint::tool(0.01),
        ]));
        assert!(playback.is_moving());
        assert_eq!(playback.remaining(), 2);
        assert_eq!(playback.advance().unwrap().joints_rad, vec![0.0, 0.1]);
        assert_eq!(playback.advance().unwrap().tool_rad, Some(0.01));
        assert!(!playback.is_moving());
        assert!(playback.advance().is_none());
    }

    #[test]
    fn width_check_allows_empty_joint_vectors() {
        let path = PlannedPath::new(vec![
            Waypoint::joints(vec![0.0; 4]),
            Waypoint::tool(0.0),
            Waypoint::joints(vec![0.0; 3]),
        ]);
        assert_eq!(path.first_bad_width(4), Some((2, 3)));
        assert_eq!(PlannedPath::default().first_bad_width(4), None);
    }

    #[test]
    fn waypoint_fields_default_when_absent() {
        let w: Waypoint = serde_json::from_str(r#"{"tool_rad": -0.01}"#).unwrap();
        assert!(w.joints_rad.is_empty());
        assert_eq!(w.tool_rad, Some(-0.01));
    }

    #[test]
    fn cancel_stops_motion() {
        let mut playback = Playback::default();
        playback.start(PlannedPath::new(vec![Waypoint::tool(0.0); 3]));
        playback.advance();
        playback.cancel();
        assert!(!playback.is_moving());
        assert_eq!(playback.remaining(), 0);
    }
}
