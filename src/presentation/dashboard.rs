//! Plain-text dashboard rendered from per-product query views.
//!
//! Panels depend on nothing but the `QueryView` contract: enabled flag,
//! status, value, error. Every panel renders a sensible body for loading,
//! empty, failed, and populated states.

use std::collections::BTreeMap;

use crate::domain::format::{format_percent, format_usd_compact};
use crate::domain::{Product, ProductOutput, Selection};
use crate::query::{QueryStatus, QueryView};

const EMPTY_QUADRANT: &str = "(none)";

/// Render the full dashboard for the current selection.
pub fn render(selection: &Selection, views: &BTreeMap<Product, QueryView>) -> String {
    let mut out = String::new();
    out.push_str(&format!("== Market analysis: {} ==\n", selection.label()));

    out.push_str("\nMarket metrics\n");
    out.push_str(&panel(views.get(&Product::MarketMetrics), metrics_body));

    out.push_str("\nKey insights\n");
    out.push_str(&panel(views.get(&Product::Insights), insights_body));

    out.push_str("\nSWOT analysis\n");
    out.push_str(&swot_panel(views.get(&Product::SwotAnalysis)));

    out.push_str("\nGrowth recommendations\n");
    out.push_str(&panel(views.get(&Product::GrowthPlan), growth_body));

    out.push_str("\nForecast\n");
    out.push_str(&panel(views.get(&Product::Forecast), forecast_body));

    out.push_str("\nHeadlines\n");
    out.push_str(&panel(views.get(&Product::MarketMetrics), headlines_body));

    out
}

/// Shared panel chrome: state handling around a Success body renderer.
fn panel<F>(view: Option<&QueryView>, body: F) -> String
where
    F: FnOnce(&ProductOutput) -> String,
{
    let Some(view) = view else {
        return "  (not available)\n".to_string();
    };
    if !view.enabled {
        return "  select an industry or company\n".to_string();
    }
    match view.status {
        QueryStatus::Idle | QueryStatus::Loading => "  loading...\n".to_string(),
        QueryStatus::Failure => {
            let message = view
                .error
                .as_ref()
                .map(|error| error.message.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            format!("  unavailable: {message}\n")
        }
        QueryStatus::Success => match view.value.as_ref() {
            Some(value) => body(value),
            None => "  (no data)\n".to_string(),
        },
    }
}

fn metrics_body(value: &ProductOutput) -> String {
    let Some(market) = value.as_market() else {
        return "  (no data)\n".to_string();
    };
    let metrics = &market.metrics;
    let mut out = String::new();
    out.push_str(&format!(
        "  Growth rate     {}\n",
        format_percent(metrics.growth_rate)
    ));
    out.push_str(&format!(
        "  Funding volume  {}\n",
        format_usd_compact(metrics.funding_volume)
    ));
    out.push_str(&format!(
        "  Market size     {}\n",
        format_usd_compact(metrics.market_size)
    ));
    if !metrics.competition_level.is_empty() {
        out.push_str(&format!("  Competition     {}\n", metrics.competition_level));
    }
    if !metrics.top_sectors.is_empty() {
        out.push_str(&format!(
            "  Top sectors     {}\n",
            metrics.top_sectors.join(", ")
        ));
    }
    out
}

fn insights_body(value: &ProductOutput) -> String {
    let Some(insights) = value.as_insights() else {
        return "  (no data)\n".to_string();
    };
    let mut out = String::new();
    if !insights.summary.is_empty() {
        out.push_str(&format!("  {}\n", insights.summary));
    }
    for takeaway in &insights.key_takeaways {
        out.push_str(&format!("  - {takeaway}\n"));
    }
    if out.is_empty() {
        out.push_str("  (no data)\n");
    }
    out
}

/// The SWOT panel always renders its four quadrants; a failed or missing
/// analysis shows them empty.
fn swot_panel(view: Option<&QueryView>) -> String {
    let matrix = view
        .filter(|view| view.status == QueryStatus::Success)
        .and_then(|view| view.value.as_ref())
        .and_then(ProductOutput::as_strategy)
        .map(|strategy| strategy.swot_matrix())
        .unwrap_or_default();

    let mut out = String::new();
    if let Some(view) = view {
        if !view.enabled {
            return "  select an industry or company\n".to_string();
        }
        match view.status {
            QueryStatus::Idle | QueryStatus::Loading => {
                return "  loading...\n".to_string();
            }
            QueryStatus::Failure => {
                let message = view
                    .error
                    .as_ref()
                    .map(|error| error.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                out.push_str(&format!("  unavailable: {message}\n"));
            }
            QueryStatus::Success => {}
        }
    }

    out.push_str(&quadrant("Strengths", &matrix.strengths));
    out.push_str(&quadrant("Weaknesses", &matrix.weaknesses));
    out.push_str(&quadrant("Opportunities", &matrix.opportunities));
    out.push_str(&quadrant("Threats", &matrix.threats));
    out
}

fn quadrant(title: &str, items: &[String]) -> String {
    let mut out = format!("  {title}:\n");
    if items.is_empty() {
        out.push_str(&format!("    {EMPTY_QUADRANT}\n"));
    } else {
        for item in items {
            out.push_str(&format!("    - {item}\n"));
        }
    }
    out
}

fn growth_body(value: &ProductOutput) -> String {
    let Some(strategy) = value.as_strategy() else {
        return "  (no data)\n".to_string();
    };
    if strategy.recommendations.is_empty() {
        return "  (no data)\n".to_string();
    }
    strategy
        .recommendations
        .iter()
        .enumerate()
        .map(|(index, recommendation)| format!("  {}. {recommendation}\n", index + 1))
        .collect()
}

fn forecast_body(value: &ProductOutput) -> String {
    let Some(forecast) = value.as_forecast() else {
        return "  (no data)\n".to_string();
    };
    let Some(last) = forecast.forecast.last() else {
        return "  (no forecast points)\n".to_string();
    };
    let mut out = String::new();
    if let Some(latest) = forecast.historical.last() {
        out.push_str(&format!(
            "  Latest observed {} value: {:.1}\n",
            forecast.metric, latest.y
        ));
    }
    out.push_str(&format!(
        "  Projected {} after {} points: {:.1} (band {:.1} to {:.1})\n",
        forecast.metric,
        forecast.forecast.len(),
        last.yhat,
        last.yhat_lower,
        last.yhat_upper
    ));
    out
}

fn headlines_body(value: &ProductOutput) -> String {
    let Some(market) = value.as_market() else {
        return "  (no data)\n".to_string();
    };
    let titles: Vec<&str> = market
        .news
        .iter()
        .filter_map(|article| article.get("title").and_then(|title| title.as_str()))
        .take(5)
        .collect();
    if titles.is_empty() {
        return "  (no recent headlines)\n".to_string();
    }
    titles
        .into_iter()
        .map(|title| format!("  - {title}\n"))
        .collect()
}
