use criterion::{Criterion, black_box, criterion_group, criterion_main};
use droid_netwatch::collectors::network_status::classify;
use droid_netwatch::collectors::traffic::{
    TrafficSnapshot, compute_throughput, format_speed, parse_interface_counters, sum_counters,
};
use std::time::Duration;
use tokio::time::Instant;

/// A traffic pseudo-file the size of a busy phone's: loopback, radio and tunnel interfaces
fn sample_proc_net_dev(interfaces: usize) -> String {
    let mut out = String::from(
        "Inter-|   Receive                                                |  Transmit\n \
         face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n \
         lo:  999999     100    0    0    0     0          0         0   999999     100    0    0    0     0       0          0\n",
    );
    for i in 0..interfaces {
        out.push_str(&format!(
            "rmnet_data{i}: {} 5000 0 0 0 0 0 0 {} 3000 0 0 0 0 0 0\n",
            1_000_000 + i * 4096,
            200_000 + i * 512
        ));
    }
    out
}

/// Benchmark pseudo-file parsing
fn benchmark_counter_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("counter_parsing");

    for size in [4, 16, 64] {
        let output = sample_proc_net_dev(size);
        group.bench_function(format!("parse_{size}_interfaces"), |b| {
            b.iter(|| black_box(parse_interface_counters(black_box(&output))));
        });
        group.bench_function(format!("sum_{size}_interfaces"), |b| {
            b.iter(|| black_box(sum_counters(black_box(&output))));
        });
    }

    group.finish();
}

/// Benchmark throughput maths and formatting on the per-second path
fn benchmark_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    let start = Instant::now();
    let prev = TrafficSnapshot::new(1_000_000, 200_000, start);
    let curr = TrafficSnapshot::new(3_500_000, 260_000, start + Duration::from_secs(1));

    group.bench_function("compute_throughput", |b| {
        b.iter(|| black_box(compute_throughput(black_box(&prev), black_box(&curr))));
    });

    group.bench_function("format_speed", |b| {
        b.iter(|| {
            for rate in [500.0, 2048.0, 5.0 * 1024.0 * 1024.0] {
                black_box(format_speed(black_box(rate)));
            }
        });
    });

    let ip_output = "30: wlan0    inet 192.168.1.5/24 brd 192.168.1.255 scope global wlan0\n\
                     12: rmnet_data2    inet 10.41.7.9/30 scope global rmnet_data2";
    group.bench_function("classify_network", |b| {
        b.iter(|| black_box(classify(black_box(ip_output), true)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_counter_parsing, benchmark_throughput);
criterion_main!(benches);
