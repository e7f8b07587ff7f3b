//! Dashboard display model.
//!
//! The dashboard has two slots: a risk score and an append-only list of
//! alerts. [`render`] maps one [`AnalysisResult`] onto a [`DashboardView`];
//! [`DisplayState`] is the in-memory view and [`TerminalView`] prints to a
//! terminal.

mod terminal;

pub use terminal::TerminalView;

use crate::client::protocol::{Alert, AnalysisResult};

/// One appended alert entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertElement {
    /// `alert-<level>` with the level lowercased.
    pub class: String,
    /// The alert message, verbatim.
    pub text: String,
    /// Recommended follow-up, when the backend supplied one.
    pub detail: Option<String>,
}

impl AlertElement {
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            class: alert_class(&alert.level),
            text: alert.message.clone(),
            detail: alert.recommended_action.clone(),
        }
    }

    /// The level part of the class (`critical` for `alert-critical`).
    pub fn level(&self) -> &str {
        self.class.strip_prefix("alert-").unwrap_or(&self.class)
    }
}

/// Something that can show a risk score and accumulate alerts.
pub trait DashboardView {
    /// Replace the displayed risk score.
    fn set_risk_score(&mut self, text: &str);
    /// Append an alert. Alerts are never removed.
    fn append_alert(&mut self, alert: AlertElement);
}

/// Render one result: overwrite the score, then append its alert if any.
pub fn render(result: &AnalysisResult, view: &mut dyn DashboardView) {
    view.set_risk_score(&format_score(result.risk_score));
    if let Some(alert) = &result.alert {
        view.append_alert(AlertElement::from_alert(alert));
    }
}

/// Magnitude from which scores are shown in exponent form.
const EXPONENT_THRESHOLD: f64 = 1e21;

/// Format a score with exactly two decimals.
///
/// Picks the nearest multiple of 0.01; a value exactly halfway rounds away
/// from zero (`0.125` shows as `0.13`). Magnitudes of `1e21` and above use
/// exponent form (`1e+21`).
pub fn format_score(score: f64) -> String {
    if score.is_nan() {
        return "NaN".to_string();
    }
    if score.is_infinite() {
        return if score > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if score < 0.0 { "-" } else { "" };
    let magnitude = score.abs();
    if magnitude >= EXPONENT_THRESHOLD {
        return format!("{sign}{}", format!("{magnitude:e}").replacen('e', "e+", 1));
    }

    // Only multiples of 1/8 with an odd numerator sit exactly on a
    // hundredths midpoint; std rounds those to even, so step past them.
    let on_midpoint = (magnitude * 8.0).fract() == 0.0 && (magnitude * 4.0).fract() != 0.0;
    let magnitude = if on_midpoint {
        f64::from_bits(magnitude.to_bits() + 1)
    } else {
        magnitude
    };

    format!("{sign}{magnitude:.2}")
}

/// CSS-style class for an alert level.
pub fn alert_class(level: &str) -> String {
    format!("alert-{}", level.to_lowercase())
}

/// In-memory dashboard. Starts empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub risk_score: Option<String>,
    pub alerts: Vec<AlertElement>,
}

impl DashboardView for DisplayState {
    fn set_risk_score(&mut self, text: &str) {
        self.risk_score = Some(text.to_string());
    }

    fn append_alert(&mut self, alert: AlertElement) {
        self.alerts.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f64, alert: Option<(&str, &str)>) -> AnalysisResult {
        AnalysisResult {
            risk_score: score,
            alert: alert.map(|(level, message)| Alert {
                level: level.to_string(),
                message: message.to_string(),
                recommended_action: None,
            }),
            session_id: None,
            timestamp: None,
        }
    }

    #[test]
    fn score_is_rounded_to_two_decimals() {
        assert_eq!(format_score(87.456), "87.46");
        assert_eq!(format_score(0.5), "0.50");
        assert_eq!(format_score(3.0), "3.00");
        assert_eq!(format_score(0.004), "0.00");
    }

    #[test]
    fn halfway_scores_round_away_from_zero() {
        assert_eq!(format_score(0.125), "0.13");
        assert_eq!(format_score(0.375), "0.38");
        assert_eq!(format_score(10.625), "10.63");
        assert_eq!(format_score(-0.125), "-0.13");
        // 1.005 is stored just below the midpoint.
        assert_eq!(format_score(1.005), "1.00");
    }

    #[test]
    fn huge_and_non_finite_scores() {
        assert_eq!(format_score(1e21), "1e+21");
        assert_eq!(format_score(-1.5e22), "-1.5e+22");
        assert_eq!(format_score(f64::NAN), "NaN");
        assert_eq!(format_score(f64::INFINITY), "Infinity");
        assert_eq!(format_score(-0.0), "0.00");
    }

    #[test]
    fn render_sets_score_without_alert() {
        let mut state = DisplayState::default();
        render(&result(87.456, None), &mut state);
        assert_eq!(state.risk_score.as_deref(), Some("87.46"));
        assert!(state.alerts.is_empty());
    }

    #[test]
    fn render_appends_lowercased_alert_class() {
        let mut state = DisplayState::default();
        render(&result(0.9, Some(("Critical", "X"))), &mut state);

        assert_eq!(state.alerts.len(), 1);
        assert_eq!(state.alerts[0].class, "alert-critical");
        assert_eq!(state.alerts[0].text, "X");
        assert_eq!(state.alerts[0].level(), "critical");
    }

    #[test]
    fn alerts_accumulate_and_score_is_replaced() {
        let mut state = DisplayState::default();
        for i in 0..5 {
            render(
                &result(f64::from(i), Some(("MEDIUM", "drift"))),
                &mut state,
            );
        }
        render(&result(1.234, None), &mut state);

        assert_eq!(state.alerts.len(), 5);
        assert!(state.alerts.iter().all(|a| a.class == "alert-medium"));
        assert_eq!(state.risk_score.as_deref(), Some("1.23"));
    }

    #[test]
    fn recommended_action_is_carried_as_detail() {
        let alert = Alert {
            level: "HIGH".to_string(),
            message: "Unusual behavioral patterns detected".to_string(),
            recommended_action: Some("Require additional authentication".to_string()),
        };
        let element = AlertElement::from_alert(&alert);
        assert_eq!(element.class, "alert-high");
        assert_eq!(
            element.detail.as_deref(),
            Some("Require additional authentication")
        );
    }
}
