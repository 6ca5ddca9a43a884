//! Performance benchmarks for critical game systems

use server::game::World;
use shared::{encode_line, Ball, ControlKey, Food, LineBuffer, ServerMessage};
use std::time::Instant;

/// Benchmarks ball physics in isolation
#[test]
fn benchmark_ball_physics() {
    let mut ball = Ball::new([255, 0, 0], 400.0, 300.0);
    let food = Food::at(10.0, 10.0);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 7 < 4 {
            ball.move_forward();
        } else {
            ball.stop_moving();
        }
        if i % 3 == 0 {
            ball.turn_left();
        }
        ball.advance();
        let _ = ball.touches(&food);
    }

    let duration = start.elapsed();
    println!(
        "Ball physics: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full engine ticks with many players
#[test]
fn benchmark_engine_ticks() {
    let mut world = World::with_seed(42);
    for id in 1..=100 {
        world.add_player(id);
        world.set_control(id, ControlKey::Forward, id % 2 == 0);
        world.set_control(id, ControlKey::TurnRight, id % 3 == 0);
    }

    let iterations = 1000;
    let start = Instant::now();
    let mut collisions = 0;

    for _ in 0..iterations {
        collisions += world.tick().collision.len();
    }

    let duration = start.elapsed();
    println!(
        "Engine: {} players × {} ticks in {:?} ({:.2} μs/tick, {} collisions)",
        world.player_count(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        collisions
    );

    assert_eq!(world.frame(), iterations);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks snapshot encoding, which happens once per tick
#[test]
fn benchmark_snapshot_encoding() {
    let mut world = World::with_seed(7);
    for id in 1..=50 {
        world.add_player(id);
    }
    let events = world.tick();
    let snapshot = world.snapshot(events);

    let iterations = 10_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let line = encode_line(&ServerMessage::Frame(snapshot.clone())).unwrap();
        bytes = line.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({:.2} μs/iter, {} bytes)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        bytes
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks splitting a stream of input lines delivered in small reads
#[test]
fn benchmark_line_splitting() {
    let line = "{\"type\":\"input\",\"key\":\"w\",\"state\":true}\n";
    let stream: Vec<u8> = line.repeat(10_000).into_bytes();

    let start = Instant::now();
    let mut buffer = LineBuffer::new();
    let mut count = 0;

    for chunk in stream.chunks(32) {
        buffer.extend(chunk);
        while let Some(_line) = buffer.next_line().unwrap() {
            count += 1;
        }
    }

    let duration = start.elapsed();
    println!("Line splitting: {} lines in {:?}", count, duration);

    assert_eq!(count, 10_000);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}
