//! Tests for the rolling window buffer.

use aqi_common::RollingWindow;

#[test]
fn test_empty_window() {
    let window = RollingWindow::new(10);
    assert!(window.is_empty());
    assert_eq!(window.len(), 0);
    assert_eq!(window.mean(), None);
    assert_eq!(window.last(), None);
}

#[test]
fn test_push_and_mean() {
    let mut window = RollingWindow::new(10);
    window.push(10.0);
    window.push(20.0);
    window.push(30.0);

    assert_eq!(window.len(), 3);
    assert_eq!(window.mean(), Some(20.0));
    assert_eq!(window.last(), Some(30.0));
}

#[test]
fn test_eviction_at_capacity() {
    let mut window = RollingWindow::new(3);
    for v in [1.0, 2.0, 3.0, 4.0] {
        window.push(v);
    }

    // The oldest sample (1.0) was evicted
    assert_eq!(window.len(), 3);
    assert!(window.is_full());
    assert_eq!(window.mean(), Some(3.0));
}

#[test]
fn test_capacity_is_stable_under_load() {
    let mut window = RollingWindow::new(60);
    for i in 0..1000 {
        window.push(i as f64);
    }
    assert_eq!(window.len(), 60);
    // Mean of 940..=999
    assert_eq!(window.mean(), Some(969.5));
}

#[test]
fn test_zero_capacity_clamped_to_one() {
    let mut window = RollingWindow::new(0);
    window.push(5.0);
    window.push(7.0);
    assert_eq!(window.len(), 1);
    assert_eq!(window.last(), Some(7.0));
}

#[test]
fn test_default_capacity_covers_one_hour() {
    let window = RollingWindow::default();
    assert!(!window.is_full());
    // 60 samples at the default 60s poll interval
    assert_eq!(aqi_common::window::DEFAULT_WINDOW_CAPACITY, 60);
}
