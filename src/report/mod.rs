pub mod html;
pub mod markdown;
pub mod tables;

pub(crate) fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}
