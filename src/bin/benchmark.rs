use colored::*;
use governor::{Quota, RateLimiter};
use hdrhistogram::Histogram;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::collections::BTreeMap;
use std::env;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

const DURATION_SECS: u64 = 20;

/// Registration load generator. Every request carries a fresh email, and
/// with SPREAD_IPS=true a fresh X-Forwarded-For, so the run measures the
/// admission path rather than the throttle.
struct Settings {
    base_url: String,
    event_id: String,
    spread_ips: bool,
}

#[tokio::main]
async fn main() {
    let Some(settings) = settings_from_env() else {
        eprintln!("{}", "❌ BENCH_EVENT_ID must point at a published event.".red().bold());
        return;
    };

    println!("{}", "🚀 Starting Admission Benchmark".bold().green());
    println!("Target URL: {}", settings.base_url);
    println!("Event ID:   {}", settings.event_id);

    let client = match Client::builder()
        .pool_max_idle_per_host(1000)
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("could not build HTTP client: {e}");
            return;
        }
    };

    if client.get(format!("{}/health", settings.base_url)).send().await.is_err() {
        eprintln!("{}", format!("❌ Server is NOT reachable at {}. Please start it first.", settings.base_url).as_str().red().bold());
        return;
    }

    let rps_stages = vec![10, 50, 200, 1000];

    println!("\n{}", "=".repeat(78));
    println!("Benchmarking Endpoint: {}", "POST /api/v1/tickets".cyan().bold());
    println!("{}", "=".repeat(78));
    println!("{:<8} | {:<10} | {:<10} | {:<6} | {:<6} | {:<6} | {:<6} | {:<6}", "RPS", "Mean (ms)", "P99 (ms)", "201", "400", "409", "429", "other");
    println!("{:-<8}-+-{:-<10}-+-{:-<10}-+-{:-<6}-+-{:-<6}-+-{:-<6}-+-{:-<6}-+-{:-<6}", "", "", "", "", "", "", "", "");

    let settings = Arc::new(settings);
    for &rps in &rps_stages {
        run_stage(&client, &settings, rps).await;
    }
}

fn settings_from_env() -> Option<Settings> {
    Some(Settings {
        base_url: env::var("BENCH_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        event_id: env::var("BENCH_EVENT_ID").ok().filter(|v| !v.trim().is_empty())?,
        spread_ips: env::var("SPREAD_IPS").map(|v| v == "true").unwrap_or(true),
    })
}

async fn run_stage(client: &Client, settings: &Arc<Settings>, rps: u32) {
    let Some(per_second) = NonZeroU32::new(rps) else {
        return;
    };
    let limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

    let (tx, mut rx) = mpsc::channel(50000);
    let start_time = Instant::now();
    let duration = Duration::from_secs(DURATION_SECS);
    let url = format!("{}/api/v1/tickets", settings.base_url);
    let mut sequence: u32 = 0;

    loop {
        if start_time.elapsed() > duration {
            break;
        }

        if limiter.check().is_ok() {
            sequence = sequence.wrapping_add(1);
            let client = client.clone();
            let url = url.clone();
            let tx = tx.clone();
            let body = json!({
                "event_id": settings.event_id,
                "full_name": format!("Bench Visitor {sequence}"),
                "email": format!("bench-{}@example.com", Uuid::new_v4()),
            });
            let forwarded = settings.spread_ips
                .then(|| format!("10.{}.{}.{}", (sequence >> 16) & 0xff, (sequence >> 8) & 0xff, sequence & 0xff));

            tokio::spawn(async move {
                let req_start = Instant::now();
                let mut req = client.post(&url).json(&body);
                if let Some(ip) = forwarded {
                    req = req.header("X-Forwarded-For", ip);
                }
                let status = req.send().await.ok().map(|r| r.status());
                let _ = tx.send((req_start.elapsed(), status)).await;
            });
        } else {
            tokio::task::yield_now().await;
        }
    }

    drop(tx);

    let Ok(mut histogram) = Histogram::<u64>::new(3) else {
        return;
    };
    let mut tally: BTreeMap<&'static str, u64> = BTreeMap::new();

    while let Some((latency, status)) = rx.recv().await {
        let bucket = match status {
            Some(StatusCode::CREATED) => "201",
            Some(StatusCode::BAD_REQUEST) => "400",
            Some(StatusCode::CONFLICT) => "409",
            Some(StatusCode::TOO_MANY_REQUESTS) => "429",
            _ => "other",
        };
        *tally.entry(bucket).or_default() += 1;
        let _ = histogram.record(latency.as_micros() as u64);
    }

    let mean_ms = histogram.mean() / 1000.0;
    let p99_ms = histogram.value_at_quantile(0.99) as f64 / 1000.0;
    let count = |key: &str| tally.get(key).copied().unwrap_or(0);

    println!(
        "{:<8} | {:<10.2} | {:<10.2} | {:<6} | {:<6} | {:<6} | {:<6} | {:<6}",
        rps,
        mean_ms,
        p99_ms,
        count("201").to_string().as_str().green(),
        count("400"),
        count("409"),
        count("429").to_string().as_str().yellow(),
        count("other").to_string().as_str().red(),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
}
