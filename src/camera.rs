//! Camera follow controller
//!
//! Decides whether the map viewport tracks the live position (`Following`)
//! or stays wherever the user put it (`Free`).
//!
//! Viewport reports do not say whether the user or the controller moved the
//! map. A report whose center lands further than
//! `max(distance_meters * 0.05, 5 m)` from the last coordinate we centered on
//! is treated as a user pan and breaks follow. The threshold scales with
//! zoom, so a wide view needs a bigger pan before follow is dropped.

use geo::HaversineDistance;
use serde::{Deserialize, Serialize};

use crate::types::{Coordinate, ViewportChange, ViewportRegion};

pub const DEFAULT_CAMERA_DISTANCE_M: f64 = 500.0;
const FOLLOW_BREAK_FRACTION: f64 = 0.05;
const FOLLOW_BREAK_FLOOR_M: f64 = 5.0;
const KM_PER_DEGREE_LONGITUDE_AT_EQUATOR: f64 = 111.32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowMode {
    /// Camera re-centers on every fix
    Following,
    /// Camera is under manual control
    Free,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub center: Coordinate,
    pub distance_meters: f64,
    pub is_following: bool,
    pub last_centered_coordinate: Option<Coordinate>,
    pub visible_horizontal_km: f64,
}

impl CameraState {
    pub fn with_distance(distance_meters: f64) -> Self {
        Self {
            center: Coordinate::default(),
            distance_meters,
            is_following: true,
            last_centered_coordinate: None,
            visible_horizontal_km: 0.0,
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::with_distance(DEFAULT_CAMERA_DISTANCE_M)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CameraFollowController {
    state: CameraState,
}

impl CameraFollowController {
    pub fn new(default_distance_meters: f64) -> Self {
        Self {
            state: CameraState::with_distance(default_distance_meters),
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn mode(&self) -> FollowMode {
        if self.state.is_following {
            FollowMode::Following
        } else {
            FollowMode::Free
        }
    }

    /// New position fix. Moves the camera only while following; returns
    /// true if the camera state changed.
    pub fn on_location(&mut self, coord: Coordinate) -> bool {
        match self.mode() {
            FollowMode::Following => {
                let moved = self.state.center != coord
                    || self.state.last_centered_coordinate != Some(coord);
                self.center_on(coord);
                moved
            }
            FollowMode::Free => false,
        }
    }

    /// Renderer reported a settled viewport.
    pub fn on_viewport_change(&mut self, change: &ViewportChange) -> bool {
        let before = self.state.clone();

        if change.distance_meters.is_finite() && change.distance_meters > 0.0 {
            self.state.distance_meters = change.distance_meters;
        }
        if let Some(km) = visible_horizontal_km(&change.region) {
            self.state.visible_horizontal_km = km;
        }

        if self.mode() == FollowMode::Following && change.center.is_finite() {
            if let Some(anchor) = self.state.last_centered_coordinate {
                let moved = haversine_meters(change.center, anchor);
                let threshold = follow_break_threshold(self.state.distance_meters);
                if moved > threshold {
                    log::info!(
                        "Viewport moved {:.1} m from last center (threshold {:.1} m), camera now free",
                        moved,
                        threshold
                    );
                    self.state.is_following = false;
                }
            }
        }

        self.state != before
    }

    /// Explicit recenter request. Always returns to following.
    pub fn on_recenter(&mut self, current_position: Option<Coordinate>) -> bool {
        let before = self.state.clone();
        self.state.is_following = true;
        match current_position {
            Some(coord) => self.center_on(coord),
            None => log::debug!("Recenter requested before the first fix"),
        }
        self.state != before
    }

    fn center_on(&mut self, coord: Coordinate) {
        self.state.center = coord;
        self.state.last_centered_coordinate = Some(coord);
    }
}

/// Pan distance that breaks follow at the given camera distance
pub fn follow_break_threshold(distance_meters: f64) -> f64 {
    (distance_meters * FOLLOW_BREAK_FRACTION).max(FOLLOW_BREAK_FLOOR_M)
}

/// Width of the visible region in km, or None if the region is not usable.
///
/// Non-finite input skips the update; a non-positive span reads as 0.
pub fn visible_horizontal_km(region: &ViewportRegion) -> Option<f64> {
    if !region.longitude_delta_degrees.is_finite() || !region.center_latitude.is_finite() {
        return None;
    }
    if region.longitude_delta_degrees <= 0.0 {
        return Some(0.0);
    }
    let km = region.longitude_delta_degrees
        * KM_PER_DEGREE_LONGITUDE_AT_EQUATOR
        * region.center_latitude.to_radians().cos();
    Some(km.max(0.0))
}

pub fn haversine_meters(a: Coordinate, b: Coordinate) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Mean earth radius used by geo's haversine
    const METERS_PER_DEGREE_LAT: f64 = 6_371_008.8 * std::f64::consts::PI / 180.0;

    fn north_of_origin(meters: f64) -> Coordinate {
        Coordinate::new(meters / METERS_PER_DEGREE_LAT, 0.0)
    }

    fn viewport_at(center: Coordinate, distance_meters: f64) -> ViewportChange {
        ViewportChange {
            center,
            distance_meters,
            region: ViewportRegion {
                center_latitude: center.latitude,
                center_longitude: center.longitude,
                latitude_delta_degrees: 0.01,
                longitude_delta_degrees: 0.01,
            },
        }
    }

    fn following_at_origin() -> CameraFollowController {
        let mut controller = CameraFollowController::default();
        controller.on_location(Coordinate::new(0.0, 0.0));
        controller
    }

    #[test]
    fn test_initial_state() {
        let controller = CameraFollowController::default();
        assert_eq!(controller.mode(), FollowMode::Following);
        assert_eq!(controller.state().distance_meters, 500.0);
        assert!(controller.state().last_centered_coordinate.is_none());
    }

    #[test]
    fn test_location_centers_while_following() {
        let mut controller = CameraFollowController::default();
        let fix = Coordinate::new(37.0, -122.0);
        assert!(controller.on_location(fix));
        assert_eq!(controller.state().center, fix);
        assert_eq!(controller.state().last_centered_coordinate, Some(fix));
        assert_eq!(controller.state().distance_meters, 500.0);
    }

    #[test]
    fn test_repeated_fix_is_not_a_change() {
        let mut controller = CameraFollowController::default();
        let fix = Coordinate::new(37.0, -122.0);
        assert!(controller.on_location(fix));
        assert!(!controller.on_location(fix));
        assert!(controller.on_location(Coordinate::new(37.0001, -122.0)));
    }

    #[test]
    fn test_first_fix_at_default_center_still_anchors() {
        let mut controller = CameraFollowController::default();
        assert!(controller.on_location(Coordinate::default()));
        assert_eq!(
            controller.state().last_centered_coordinate,
            Some(Coordinate::default())
        );
    }

    #[test]
    fn test_small_pan_keeps_following() {
        let mut controller = following_at_origin();
        controller.on_viewport_change(&viewport_at(north_of_origin(20.0), 500.0));
        assert_eq!(controller.mode(), FollowMode::Following);
    }

    #[test]
    fn test_large_pan_breaks_follow() {
        let mut controller = following_at_origin();
        assert!(controller.on_viewport_change(&viewport_at(north_of_origin(30.0), 500.0)));
        assert_eq!(controller.mode(), FollowMode::Free);
        assert!(!controller.state().is_following);
    }

    #[test]
    fn test_threshold_floor_at_close_zoom() {
        assert_eq!(follow_break_threshold(40.0), 5.0);
        assert_eq!(follow_break_threshold(500.0), 25.0);

        let mut controller = following_at_origin();
        controller.on_viewport_change(&viewport_at(north_of_origin(4.0), 40.0));
        assert_eq!(controller.mode(), FollowMode::Following);
        controller.on_viewport_change(&viewport_at(north_of_origin(6.0), 40.0));
        assert_eq!(controller.mode(), FollowMode::Free);
    }

    #[test]
    fn test_zoom_out_widens_threshold() {
        let mut controller = following_at_origin();
        // 100 m pan at 5 km camera distance is under the 250 m threshold
        controller.on_viewport_change(&viewport_at(north_of_origin(100.0), 5_000.0));
        assert_eq!(controller.mode(), FollowMode::Following);
        assert_eq!(controller.state().distance_meters, 5_000.0);
    }

    #[test]
    fn test_viewport_before_first_fix_never_breaks_follow() {
        let mut controller = CameraFollowController::default();
        controller.on_viewport_change(&viewport_at(Coordinate::new(10.0, 10.0), 500.0));
        assert_eq!(controller.mode(), FollowMode::Following);
    }

    #[test]
    fn test_free_ignores_location() {
        let mut controller = following_at_origin();
        controller.on_viewport_change(&viewport_at(north_of_origin(1_000.0), 500.0));
        assert_eq!(controller.mode(), FollowMode::Free);
        let center = controller.state().center;

        assert!(!controller.on_location(Coordinate::new(1.0, 1.0)));
        assert_eq!(controller.state().center, center);
        assert_eq!(
            controller.state().last_centered_coordinate,
            Some(Coordinate::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_viewport_updates_zoom_while_free() {
        let mut controller = following_at_origin();
        controller.on_viewport_change(&viewport_at(north_of_origin(1_000.0), 500.0));
        controller.on_viewport_change(&viewport_at(north_of_origin(1_000.0), 1_200.0));
        assert_eq!(controller.state().distance_meters, 1_200.0);
        assert_eq!(controller.mode(), FollowMode::Free);
    }

    #[test]
    fn test_recenter_returns_to_following() {
        let mut controller = following_at_origin();
        controller.on_viewport_change(&viewport_at(north_of_origin(1_000.0), 800.0));
        assert_eq!(controller.mode(), FollowMode::Free);

        let latest = Coordinate::new(0.5, 0.5);
        assert!(controller.on_recenter(Some(latest)));
        assert_eq!(controller.mode(), FollowMode::Following);
        assert_eq!(controller.state().center, latest);
        assert_eq!(controller.state().last_centered_coordinate, Some(latest));
        assert_eq!(controller.state().distance_meters, 800.0);
    }

    #[test]
    fn test_recenter_while_following_is_harmless() {
        let mut controller = following_at_origin();
        let latest = Coordinate::new(0.0, 0.0);
        assert!(!controller.on_recenter(Some(latest)));
        assert_eq!(controller.mode(), FollowMode::Following);
    }

    #[test]
    fn test_recenter_without_position() {
        let mut controller = following_at_origin();
        controller.on_viewport_change(&viewport_at(north_of_origin(1_000.0), 500.0));
        controller.on_recenter(None);
        assert_eq!(controller.mode(), FollowMode::Following);
        assert_eq!(controller.state().center, Coordinate::new(0.0, 0.0));
    }

    #[test]
    fn test_visible_km_at_sixty_degrees() {
        let region = ViewportRegion {
            center_latitude: 60.0,
            center_longitude: 0.0,
            latitude_delta_degrees: 1.0,
            longitude_delta_degrees: 1.0,
        };
        let km = visible_horizontal_km(&region).unwrap();
        assert_relative_eq!(km, 55.66, epsilon = 0.01);
    }

    #[test]
    fn test_degenerate_viewport() {
        let mut region = ViewportRegion::default();
        assert_eq!(visible_horizontal_km(&region), Some(0.0));

        region.longitude_delta_degrees = f64::NAN;
        assert_eq!(visible_horizontal_km(&region), None);

        let mut controller = following_at_origin();
        let mut change = viewport_at(Coordinate::new(0.0, 0.0), 0.0);
        change.region.longitude_delta_degrees = f64::INFINITY;
        controller.on_viewport_change(&change);
        assert_eq!(controller.state().distance_meters, 500.0);
        assert_eq!(controller.state().visible_horizontal_km, 0.0);
        assert_eq!(controller.mode(), FollowMode::Following);
    }
}
