//! Concurrent traffic across a failover.

use std::time::{Duration, Instant};
use failover_sdk::FailoverClient;

mod common;

#[tokio::test]
async fn test_traffic_survives_primary_crash() {
    let primary = common::spawn_simulated("primary").await;
    let spare = common::spawn_simulated("spare").await;
    let ctl = common::spawn_controller(common::config(primary.addr, spare.addr)).await;
    let sdk = FailoverClient::new(&ctl.url());

    let concurrency = 10;
    let run_for = Duration::from_millis(2000);
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = format!("{}/api", ctl.url());
        tasks.push(tokio::spawn(async move {
            let mut ok = 0u32;
            let mut failed = 0u32;
            let mut latencies = Vec::new();
            while start.elapsed() < run_for {
                let req_start = Instant::now();
                match client.get(&url).send().await {
                    Ok(res) if res.status().is_success() => {
                        ok += 1;
                        latencies.push(req_start.elapsed());
                    }
                    _ => failed += 1,
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            (ok, failed, latencies)
        }));
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    let injected = sdk.inject_failure("crash").await.unwrap();

    let mut ok = 0;
    let mut failed = 0;
    let mut all_latencies = Vec::new();
    for task in tasks {
        let (o, f, latencies) = task.await.unwrap();
        ok += o;
        failed += f;
        all_latencies.extend(latencies);
    }

    // Every request that hit the dead primary was retried once on the spare.
    assert_eq!(failed, 0, "client-visible failures during failover");
    assert!(ok > 0);

    let metrics = sdk.metrics().await.unwrap();
    assert_eq!(metrics.t_fail, Some(injected.t_fail));
    assert_eq!(metrics.active_target, "spare");
    let recover_ms = metrics.time_to_recover_ms.expect("spare answered after the crash");
    assert!(recover_ms < 2000, "time to recover {}ms", recover_ms);
    let error_rate = metrics.error_rate.expect("window has traffic");
    assert!(error_rate > 0.0 && error_rate < 1.0);
    assert_eq!(ctl.controller.state().switchovers, 1);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Failover Load Results ---");
    println!("Successful:     {}", ok);
    println!("Attempts:       {}", metrics.total_requests);
    println!("T_recover:      {}ms", recover_ms);
    println!("Error rate:     {:.3}", error_rate);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-----------------------------\n");
}
