use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;
use std::time::Instant;

use super::open_gateway;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, SearchFilter, SearchResults, SourceType};
use crate::services::Reference;

/// Filter flags shared by `search` and `similar`.
#[derive(Debug, Args)]
pub struct FilterArgs {
    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,

    #[arg(long, help = "Minimum similarity score threshold (0.0-1.0)")]
    pub min_score: Option<f32>,

    #[arg(
        long,
        short = 's',
        help = "Filter by source type (e.g., 'paper,report')"
    )]
    pub source: Option<String>,

    #[arg(long, short = 'c', help = "Filter by category (e.g., 'NLP,AI')")]
    pub category: Option<String>,

    #[arg(long, help = "Minimum importance score (0.0-1.0)")]
    pub min_importance: Option<f32>,

    #[arg(long, help = "Collected on or after (YYYY-MM-DD or RFC 3339)")]
    pub from: Option<String>,

    #[arg(long, help = "Collected on or before (YYYY-MM-DD or RFC 3339)")]
    pub to: Option<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Args)]
pub struct SimilarArgs {
    #[arg(
        long,
        conflicts_with = "source_id",
        required_unless_present = "source_id",
        help = "Vector id of the reference record"
    )]
    pub vector_id: Option<String>,

    #[arg(long, help = "Source id of the reference record")]
    pub source_id: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Limit, threshold and filter resolved against config defaults.
struct ResolvedQuery {
    limit: u64,
    min_score: Option<f32>,
    filter: SearchFilter,
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Accepts RFC 3339 or a bare date; a bare `--to` date covers the whole day.
fn parse_date(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        Some(NaiveTime::MIN)
    }
    .context("invalid time of day")?;
    Ok(date.and_time(time).and_utc())
}

fn check_unit(name: &str, value: Option<f32>) -> Result<()> {
    if let Some(v) = value
        && !(0.0..=1.0).contains(&v)
    {
        anyhow::bail!("{name} must be between 0.0 and 1.0");
    }
    Ok(())
}

fn resolve(args: &FilterArgs, config: &Config) -> Result<ResolvedQuery> {
    let limit = args.limit.unwrap_or(config.search.default_limit);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let min_score = args.min_score.or(config.search.default_min_score);
    check_unit("min_score", min_score)?;
    check_unit("min_importance", args.min_importance)?;

    let source_types: Vec<SourceType> = split_list(args.source.as_deref())
        .iter()
        .map(|s| {
            let Ok(source_type) = s.parse::<SourceType>();
            source_type
        })
        .collect();

    let from = args.from.as_deref().map(|s| parse_date(s, false)).transpose()?;
    let to = args.to.as_deref().map(|s| parse_date(s, true)).transpose()?;
    if let (Some(from), Some(to)) = (from, to)
        && from > to
    {
        anyhow::bail!("--from must not be after --to");
    }

    let mut filter = SearchFilter::new()
        .with_source_types(source_types)
        .with_categories(split_list(args.category.as_deref()))
        .with_collected_range(from, to);
    if let Some(min) = args.min_importance {
        filter = filter.with_min_importance(min);
    }

    Ok(ResolvedQuery {
        limit: u64::from(limit),
        min_score,
        filter,
    })
}

fn print_query(query: &ResolvedQuery) {
    eprintln!("  Limit: {}", query.limit);
    if let Some(score) = query.min_score {
        eprintln!("  Min score: {score:.3}");
    }
    if !query.filter.is_empty() {
        let filter = serde_json::to_string(&query.filter).unwrap_or_default();
        eprintln!("  Filter: {filter}");
    }
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let resolved = resolve(&args.filter, &config)?;

    if verbose {
        eprintln!("Query: \"{query}\"");
        print_query(&resolved);
    }

    let start_time = Instant::now();
    let gateway = open_gateway(&config).await?;
    let results = gateway
        .search_text(query, resolved.limit, resolved.min_score, &resolved.filter)
        .await
        .context("search failed")?;

    let duration_ms = start_time.elapsed().as_millis() as u64;
    let search_results = SearchResults::new(query.to_string(), results, duration_ms);
    print!("{}", formatter.format_search_results(&search_results));

    Ok(())
}

pub async fn handle_similar(args: SimilarArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let reference = match (args.vector_id, args.source_id) {
        (Some(id), _) => Reference::VectorId(id),
        (None, Some(id)) => Reference::SourceId(id),
        (None, None) => anyhow::bail!("either --vector-id or --source-id is required"),
    };
    let label = match &reference {
        Reference::VectorId(id) => format!("similar to vector {id}"),
        Reference::SourceId(id) => format!("similar to source {id}"),
    };

    let config = Config::load()?;
    let formatter = get_formatter(format);
    let resolved = resolve(&args.filter, &config)?;

    if verbose {
        eprintln!("Reference: {label}");
        print_query(&resolved);
    }

    let start_time = Instant::now();
    let gateway = open_gateway(&config).await?;
    let results = gateway
        .find_similar(&reference, resolved.limit, resolved.min_score, &resolved.filter)
        .await
        .context("similarity search failed")?;

    let duration_ms = start_time.elapsed().as_millis() as u64;
    print!(
        "{}",
        formatter.format_search_results(&SearchResults::new(label, results, duration_ms))
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args() -> FilterArgs {
        FilterArgs {
            limit: None,
            min_score: None,
            source: Some("paper, Report".into()),
            category: Some("NLP,,AI".into()),
            min_importance: Some(0.5),
            from: Some("2024-03-01".into()),
            to: Some("2024-03-31".into()),
        }
    }

    #[test]
    fn test_resolve_builds_filter() {
        let resolved = resolve(&args(), &Config::default()).unwrap();
        assert_eq!(resolved.limit, 10);
        assert_eq!(
            resolved.filter.source_types,
            vec![SourceType::Paper, SourceType::Report]
        );
        assert_eq!(resolved.filter.categories, vec!["NLP", "AI"]);
        assert_eq!(resolved.filter.min_importance, Some(0.5));
        assert_eq!(
            resolved.filter.collected_from,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert!(
            resolved.filter.collected_to.unwrap()
                > Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let mut bad = args();
        bad.min_score = Some(1.5);
        assert!(resolve(&bad, &Config::default()).is_err());

        let mut bad = args();
        bad.from = Some("2024-04-01".into());
        assert!(resolve(&bad, &Config::default()).is_err());

        let mut bad = args();
        bad.limit = Some(0);
        assert!(resolve(&bad, &Config::default()).is_err());

        assert!(parse_date("yesterday", false).is_err());
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts = parse_date("2024-03-05T10:00:00+09:00", false).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 5, 1, 0, 0).unwrap());
    }
}
