//! The fixed action vocabulary the vision model plans with, plus plan
//! parsing and coordinate conversion.
//!
//! The model answers with a raw JSON array of action objects. Click-class
//! actions carry a bounding box `[ymin, xmin, ymax, xmax]` in a 0–1000
//! normalized space; the worker converts box centers to pixels against the
//! current logical screen size.

use serde::Deserialize;
use tracing::warn;

/// `[ymin, xmin, ymax, xmax]`, each coordinate in 0–1000.
pub type BBox = [f64; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// One planned step. `thought` is the model's rationale — logged, never acted on.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedStep {
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Click { bbox: BBox },
    DoubleClick { bbox: BBox },
    RightClick { bbox: BBox },
    Type { text: String },
    Hotkey { keys: Vec<String> },
    Scroll {
        #[serde(default = "default_direction")]
        direction: ScrollDirection,
        #[serde(default = "default_amount")]
        amount: u32,
    },
    MoveTo { point: [f64; 2] },
    Wait {
        #[serde(default = "default_wait")]
        duration: f64,
    },
    AskUser { question: String },
    Finish {
        #[serde(default)]
        reason: Option<String>,
    },
}

fn default_direction() -> ScrollDirection {
    ScrollDirection::Down
}
fn default_amount() -> u32 {
    3
}
fn default_wait() -> f64 {
    1.0
}

/// Convert a normalized bbox center to pixel coordinates.
pub fn bbox_center_pixels(bbox: &BBox, width: u32, height: u32) -> (u32, u32) {
    let [ymin, xmin, ymax, xmax] = *bbox;
    let cx = (xmin + xmax) / 2.0 / 1000.0 * width as f64;
    let cy = (ymin + ymax) / 2.0 / 1000.0 * height as f64;
    (
        cx.round().clamp(0.0, width.saturating_sub(1) as f64) as u32,
        cy.round().clamp(0.0, height.saturating_sub(1) as f64) as u32,
    )
}

/// Convert a normalized `[x, y]` point to pixel coordinates.
pub fn point_pixels(point: &[f64; 2], width: u32, height: u32) -> (u32, u32) {
    let px = point[0] / 1000.0 * width as f64;
    let py = point[1] / 1000.0 * height as f64;
    (
        px.round().clamp(0.0, width.saturating_sub(1) as f64) as u32,
        py.round().clamp(0.0, height.saturating_sub(1) as f64) as u32,
    )
}

/// Parse the model's plan text into steps.
///
/// Tolerates markdown code fences and a single bare object instead of an
/// array. Returns an empty vec on undecodable output — the worker re-plans.
pub fn parse_plan(content: &str) -> Vec<PlannedStep> {
    let cleaned = content
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    match serde_json::from_str::<Vec<PlannedStep>>(&cleaned) {
        Ok(steps) => steps,
        Err(_) => match serde_json::from_str::<PlannedStep>(&cleaned) {
            Ok(step) => vec![step],
            Err(e) => {
                warn!(error = %e, "vision plan did not parse");
                Vec::new()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_multi_step_plan() {
        let plan = parse_plan(
            r#"[
                {"thought": "open the search bar", "action": "CLICK", "bbox": [100, 200, 150, 400]},
                {"action": "TYPE", "text": "weather"},
                {"action": "SCROLL", "direction": "up", "amount": 5}
            ]"#,
        );
        assert_eq!(plan.len(), 3);
        assert!(matches!(plan[0].action, Action::Click { .. }));
        assert_eq!(plan[0].thought.as_deref(), Some("open the search bar"));
        match &plan[2].action {
            Action::Scroll { direction, amount } => {
                assert_eq!(*direction, ScrollDirection::Up);
                assert_eq!(*amount, 5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn strips_code_fences() {
        let plan = parse_plan("```json\n[{\"action\": \"FINISH\", \"reason\": \"done\"}]\n```");
        assert_eq!(plan.len(), 1);
        assert!(matches!(plan[0].action, Action::Finish { .. }));
    }

    #[test]
    fn accepts_a_bare_object() {
        let plan = parse_plan(r#"{"action": "WAIT", "duration": 2.5}"#);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn garbage_parses_to_empty() {
        assert!(parse_plan("I think I should click the button").is_empty());
    }

    #[test]
    fn bbox_center_maps_to_screen_pixels() {
        // Center of [100, 200, 300, 400] is (300, 200) normalized.
        let (x, y) = bbox_center_pixels(&[100.0, 200.0, 300.0, 400.0], 1920, 1080);
        assert_eq!(x, (0.3f64 * 1920.0).round() as u32);
        assert_eq!(y, (0.2f64 * 1080.0).round() as u32);
    }

    #[test]
    fn bbox_center_clamps_to_bounds() {
        let (x, y) = bbox_center_pixels(&[990.0, 990.0, 1100.0, 1100.0], 800, 600);
        assert!(x < 800);
        assert!(y < 600);
    }
}
