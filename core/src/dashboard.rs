//! Chart series and stat cards behind the dashboard.
//!
//! The dashboard keeps the last fetched entries sorted by date and rebuilds
//! every chart from scratch whenever data or the visible range changes.
//! Range filters count back from the latest recorded day, so a dataset that
//! stopped a month ago still shows its last 30 days instead of an empty chart.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::HealthEntry;
use crate::moving_average::{DEFAULT_WINDOW, moving_average};
use crate::stats::StatsWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFilter {
    LastDays(i64),
    All,
}

impl RangeFilter {
    pub const DEFAULT: Self = Self::LastDays(90);

    /// Accepts `all`, `Nd` or a bare day count.
    pub fn parse(raw: &str) -> Result<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        if lower == "all" {
            return Ok(Self::All);
        }
        let digits = lower.strip_suffix('d').unwrap_or(&lower);
        match digits.parse::<i64>() {
            Ok(days) if days > 0 => Ok(Self::LastDays(days)),
            _ => Err(Error::validation(format!(
                "Invalid range '{raw}'. Use e.g. 30d, 90d or all"
            ))),
        }
    }
}

impl Default for RangeFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastDays(days) => write!(f, "{days}d"),
            Self::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Weight,
    BodyFat,
    Calories,
    Steps,
    Sleep,
}

impl Metric {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Metric::Weight => "Weight",
            Metric::BodyFat => "Body fat",
            Metric::Calories => "Calories",
            Metric::Steps => "Steps",
            Metric::Sleep => "Sleep",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Metric::Weight => "kg",
            Metric::BodyFat => "%",
            Metric::Calories => "kcal",
            Metric::Steps => "steps",
            Metric::Sleep => "h",
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn value(self, entry: &HealthEntry) -> Option<f64> {
        match self {
            Metric::Weight => entry.weight,
            Metric::BodyFat => entry.body_fat,
            Metric::Calories => entry.calories.map(|v| v as f64),
            Metric::Steps => entry.steps.map(|v| v as f64),
            Metric::Sleep => entry.sleep_total,
        }
    }
}

struct ChartLayout {
    id: &'static str,
    title: &'static str,
    metrics: &'static [Metric],
}

const CHART_LAYOUTS: &[ChartLayout] = &[
    ChartLayout {
        id: "weight",
        title: "Weight",
        metrics: &[Metric::Weight],
    },
    ChartLayout {
        id: "body_fat",
        title: "Body fat",
        metrics: &[Metric::BodyFat],
    },
    ChartLayout {
        id: "activity",
        title: "Calories & steps",
        metrics: &[Metric::Calories, Metric::Steps],
    },
    ChartLayout {
        id: "sleep",
        title: "Sleep",
        metrics: &[Metric::Sleep],
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub metric: Metric,
    pub label: &'static str,
    pub unit: &'static str,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub id: &'static str,
    pub title: &'static str,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatCard {
    pub label: &'static str,
    /// `None` for the entry count card.
    pub metric: Option<Metric>,
    pub value: Option<f64>,
    pub unit: &'static str,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    entries: Vec<HealthEntry>,
    latest_date: Option<NaiveDate>,
    stats: Option<StatsWindow>,
    range: RangeFilter,
    average_window: usize,
    charts: Vec<Chart>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    #[must_use]
    pub fn new() -> Self {
        let mut dashboard = Self {
            entries: Vec::new(),
            latest_date: None,
            stats: None,
            range: RangeFilter::DEFAULT,
            average_window: DEFAULT_WINDOW,
            charts: Vec::new(),
        };
        dashboard.render();
        dashboard
    }

    #[must_use]
    pub fn with_average_window(mut self, window: usize) -> Self {
        self.average_window = window;
        self.render();
        self
    }

    /// Swap in freshly fetched data and redraw every chart.
    pub fn replace(&mut self, mut entries: Vec<HealthEntry>, stats: Option<StatsWindow>) {
        entries.sort_by_key(|e| e.date);
        self.latest_date = entries.last().map(|e| e.date);
        self.entries = entries;
        self.stats = stats;
        self.render();
    }

    pub fn apply_range(&mut self, range: RangeFilter) {
        self.range = range;
        self.render();
    }

    #[must_use]
    pub fn range(&self) -> RangeFilter {
        self.range
    }

    #[must_use]
    pub fn average_window(&self) -> usize {
        self.average_window
    }

    #[must_use]
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest_date
    }

    #[must_use]
    pub fn entries(&self) -> &[HealthEntry] {
        &self.entries
    }

    #[must_use]
    pub fn stats(&self) -> Option<&StatsWindow> {
        self.stats.as_ref()
    }

    #[must_use]
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// First visible day under the current range, counted back from the
    /// latest entry.
    #[must_use]
    pub fn visible_from(&self) -> Option<NaiveDate> {
        let latest = self.latest_date?;
        match self.range {
            RangeFilter::All => self.entries.first().map(|e| e.date),
            RangeFilter::LastDays(days) => Duration::try_days(days - 1)
                .and_then(|span| latest.checked_sub_signed(span))
                .or(Some(NaiveDate::MIN)),
        }
    }

    #[must_use]
    pub fn stat_cards(&self) -> Vec<StatCard> {
        let averages = self.stats.as_ref().map(|s| &s.stats);
        #[allow(clippy::cast_precision_loss)]
        let total = averages.map(|a| a.total_entries as f64);
        vec![
            StatCard {
                label: "Avg weight",
                metric: Some(Metric::Weight),
                value: averages.and_then(|a| a.avg_weight),
                unit: Metric::Weight.unit(),
            },
            StatCard {
                label: "Avg body fat",
                metric: Some(Metric::BodyFat),
                value: averages.and_then(|a| a.avg_body_fat),
                unit: Metric::BodyFat.unit(),
            },
            StatCard {
                label: "Avg calories",
                metric: Some(Metric::Calories),
                value: averages.and_then(|a| a.avg_calories),
                unit: Metric::Calories.unit(),
            },
            StatCard {
                label: "Avg steps",
                metric: Some(Metric::Steps),
                value: averages.and_then(|a| a.avg_steps),
                unit: Metric::Steps.unit(),
            },
            StatCard {
                label: "Avg sleep",
                metric: Some(Metric::Sleep),
                value: averages.and_then(|a| a.avg_sleep),
                unit: Metric::Sleep.unit(),
            },
            StatCard {
                label: "Entries",
                metric: None,
                value: total,
                unit: "",
            },
        ]
    }

    #[must_use]
    pub fn view(&self) -> DashboardView<'_> {
        DashboardView {
            range: self.range.to_string(),
            latest_date: self.latest_date,
            visible_from: self.visible_from(),
            stats: self.stats.as_ref(),
            cards: self.stat_cards(),
            charts: &self.charts,
        }
    }

    // Averages run over the whole series before the range cut, so the first
    // visible points still carry their trailing history.
    fn render(&mut self) {
        let visible_from = self.visible_from();
        let is_visible = |date: NaiveDate| visible_from.is_none_or(|from| date >= from);

        self.charts = CHART_LAYOUTS
            .iter()
            .map(|layout| Chart {
                id: layout.id,
                title: layout.title,
                series: layout
                    .metrics
                    .iter()
                    .map(|&metric| {
                        let values: Vec<Option<f64>> =
                            self.entries.iter().map(|e| metric.value(e)).collect();
                        let averages = moving_average(&values, self.average_window);
                        let points = self
                            .entries
                            .iter()
                            .zip(values.into_iter().zip(averages))
                            .filter(|(entry, _)| is_visible(entry.date))
                            .map(|(entry, (value, average))| ChartPoint {
                                date: entry.date,
                                value,
                                average,
                            })
                            .collect();
                        Series {
                            metric,
                            label: metric.label(),
                            unit: metric.unit(),
                            points,
                        }
                    })
                    .collect(),
            })
            .collect();
    }
}

/// Serializable snapshot of the dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub range: String,
    pub latest_date: Option<NaiveDate>,
    pub visible_from: Option<NaiveDate>,
    pub stats: Option<&'a StatsWindow>,
    pub cards: Vec<StatCard>,
    pub charts: &'a [Chart],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{WindowSpec, compute_stats};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(d: NaiveDate, weight: f64) -> HealthEntry {
        HealthEntry {
            id: 0,
            date: d,
            weight: Some(weight),
            body_fat: None,
            calories: Some(2000),
            steps: None,
            sleep_total: Some(7.0),
            sleep_quality: None,
            observations: None,
            created_at: String::new(),
        }
    }

    /// `days` consecutive entries ending on `last`, weights counting up from 1.
    #[allow(clippy::cast_precision_loss)]
    fn run_of_days(last: NaiveDate, days: i64) -> Vec<HealthEntry> {
        (0..days)
            .map(|i| entry(last - Duration::days(days - 1 - i), (i + 1) as f64))
            .collect()
    }

    fn weight_points(dashboard: &Dashboard) -> &[ChartPoint] {
        &dashboard.charts()[0].series[0].points
    }

    #[test]
    fn test_range_filter_parse() {
        assert_eq!(RangeFilter::parse("30d").unwrap(), RangeFilter::LastDays(30));
        assert_eq!(RangeFilter::parse("90").unwrap(), RangeFilter::LastDays(90));
        assert_eq!(RangeFilter::parse("ALL").unwrap(), RangeFilter::All);
        assert!(RangeFilter::parse("0d").is_err());
        assert!(RangeFilter::parse("3m").is_err());
        assert_eq!(RangeFilter::default().to_string(), "90d");
    }

    #[test]
    fn test_four_charts_cover_every_metric() {
        let dashboard = Dashboard::new();
        let ids: Vec<&str> = dashboard.charts().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["weight", "body_fat", "activity", "sleep"]);
        assert_eq!(dashboard.charts()[2].series.len(), 2);
        assert!(weight_points(&dashboard).is_empty());
        assert_eq!(dashboard.latest_date(), None);
    }

    #[test]
    fn test_replace_sorts_and_tracks_latest() {
        let mut entries = run_of_days(date("2026-02-15"), 6);
        entries.reverse();

        let mut dashboard = Dashboard::new();
        dashboard.replace(entries, None);

        assert_eq!(dashboard.latest_date(), Some(date("2026-02-15")));
        let dates: Vec<NaiveDate> = weight_points(&dashboard).iter().map(|p| p.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(dates.len(), 6);
    }

    #[test]
    fn test_range_anchors_on_latest_entry_not_today() {
        // data stops long before "today"
        let mut dashboard = Dashboard::new();
        dashboard.replace(run_of_days(date("2025-06-30"), 120), None);

        dashboard.apply_range(RangeFilter::LastDays(30));
        let points = weight_points(&dashboard);
        assert_eq!(points.len(), 30);
        assert_eq!(points[0].date, date("2025-06-01"));
        assert_eq!(dashboard.visible_from(), Some(date("2025-06-01")));

        dashboard.apply_range(RangeFilter::All);
        assert_eq!(weight_points(&dashboard).len(), 120);
    }

    #[test]
    fn test_averages_keep_history_before_range() {
        let mut dashboard = Dashboard::new();
        dashboard.replace(run_of_days(date("2026-02-28"), 20), None);
        dashboard.apply_range(RangeFilter::LastDays(3));

        let points = weight_points(&dashboard);
        assert_eq!(points.len(), 3);
        // weights 18, 19, 20: each has a full 7-day history behind it
        assert_eq!(points[0].value, Some(18.0));
        assert_eq!(points[0].average, Some(15.0));
        assert_eq!(points[2].average, Some(17.0));
    }

    #[test]
    fn test_replace_discards_previous_charts() {
        let mut dashboard = Dashboard::new();
        dashboard.replace(run_of_days(date("2026-02-28"), 20), None);
        dashboard.replace(run_of_days(date("2026-03-05"), 2), None);

        let points = weight_points(&dashboard);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.average.is_none()));
        assert_eq!(dashboard.latest_date(), Some(date("2026-03-05")));
    }

    #[test]
    fn test_custom_average_window() {
        let mut dashboard = Dashboard::new().with_average_window(2);
        dashboard.replace(run_of_days(date("2026-02-03"), 3), None);
        let averages: Vec<Option<f64>> = weight_points(&dashboard).iter().map(|p| p.average).collect();
        assert_eq!(averages, vec![None, Some(1.5), Some(2.5)]);
    }

    #[test]
    fn test_stat_cards() {
        let entries = run_of_days(date("2026-02-15"), 6);
        let stats = compute_stats(&entries, &WindowSpec::all_time(), date("2026-10-15")).unwrap();

        let mut dashboard = Dashboard::new();
        assert!(dashboard.stat_cards().iter().all(|c| c.value.is_none()));

        dashboard.replace(entries, Some(stats));
        let cards = dashboard.stat_cards();
        assert_eq!(cards[0].value, Some(3.5));
        assert_eq!(cards[2].value, Some(2000.0));
        assert_eq!(cards[3].value, None);
        assert_eq!(cards[5].value, Some(6.0));
    }

    #[test]
    fn test_view_serializes() {
        let mut dashboard = Dashboard::new();
        dashboard.replace(run_of_days(date("2026-02-15"), 2), None);
        let json = serde_json::to_value(dashboard.view()).unwrap();

        assert_eq!(json["range"], "90d");
        assert_eq!(json["latest_date"], "2026-02-15");
        assert_eq!(json["charts"][0]["id"], "weight");
        assert_eq!(json["charts"][2]["series"][1]["metric"], "steps");
        assert!(json["stats"].is_null());
    }
}
