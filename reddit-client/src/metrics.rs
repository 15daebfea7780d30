use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::rate_limiter::RateLimitStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub total_response_time: Duration,
    pub last_request_time: Option<DateTime<Utc>>,
    pub requests_by_route: HashMap<String, RouteMetrics>,
}

impl ApiMetrics {
    pub fn average_response_time(&self) -> Duration {
        if self.total_requests == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.total_requests as u32
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub total_response_time: Duration,
    pub max_response_time: Duration,
    pub last_error: Option<String>,
}

/// One finished Reddit request. `route` is the templated path
/// (`/user/{name}/about`) so per-user lookups share a bucket.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub route: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub success: bool,
    pub rate_limited: bool,
    pub error_type: Option<String>,
}

impl RouteMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            total_response_time: Duration::ZERO,
            max_response_time: Duration::ZERO,
            last_error: None,
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.max_response_time = self.max_response_time.max(metrics.response_time);

        if metrics.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
            self.last_error = metrics.error_type.clone();
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.request_count as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.request_count as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RwLock<ApiMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.total_response_time += request_metrics.response_time;
        metrics.last_request_time = Some(Utc::now());

        if request_metrics.success {
            metrics.successful_requests += 1;
        } else {
            metrics.failed_requests += 1;
        }
        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        metrics
            .requests_by_route
            .entry(request_metrics.route.clone())
            .or_insert_with(RouteMetrics::new)
            .update(&request_metrics);
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.read().await.clone()
    }
}

/// Per-route slice of [`SourceStatus`].
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    pub requests: u64,
    pub success_rate: f64,
    pub avg_response_ms: u64,
    pub last_error: Option<String>,
}

/// Snapshot of one Reddit client: request counters, limiter headroom and
/// breaker state. Reported by `/health`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub avg_response_ms: u64,
    pub routes: BTreeMap<String, RouteStatus>,
    pub available_tokens: u32,
    pub requests_per_minute: u32,
    pub rate_limit_utilization: f64,
    pub near_rate_limit: bool,
    pub circuit_breaker: String,
    pub total_retries: u64,
}

impl SourceStatus {
    pub fn from_parts(
        metrics: &ApiMetrics,
        limits: &RateLimitStatus,
        circuit_breaker: &str,
        total_retries: u64,
    ) -> Self {
        let routes = metrics
            .requests_by_route
            .iter()
            .map(|(route, m)| {
                let status = RouteStatus {
                    requests: m.request_count,
                    success_rate: m.success_rate(),
                    avg_response_ms: m.average_response_time().as_millis() as u64,
                    last_error: m.last_error.clone(),
                };
                (route.clone(), status)
            })
            .collect();

        Self {
            total_requests: metrics.total_requests,
            failed_requests: metrics.failed_requests,
            rate_limited_requests: metrics.rate_limited_requests,
            avg_response_ms: metrics.average_response_time().as_millis() as u64,
            routes,
            available_tokens: limits.available_tokens,
            requests_per_minute: limits.requests_per_minute,
            rate_limit_utilization: (limits.utilization_percentage() * 10.0).round() / 10.0,
            near_rate_limit: limits.is_near_limit(),
            circuit_breaker: circuit_breaker.to_string(),
            total_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(route: &str, success: bool, millis: u64) -> RequestMetrics {
        RequestMetrics {
            route: route.to_string(),
            status_code: Some(if success { 200 } else { 429 }),
            response_time: Duration::from_millis(millis),
            success,
            rate_limited: !success,
            error_type: (!success).then(|| "rate_limited".to_string()),
        }
    }

    #[tokio::test]
    async fn test_metrics_collection() {
        let collector = MetricsCollector::new();
        collector.record_request(sample("/r/{sub}/hot", true, 150)).await;
        collector.record_request(sample("/r/{sub}/hot", false, 50)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.successful_requests, 1);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.rate_limited_requests, 1);
        assert_eq!(metrics.average_response_time(), Duration::from_millis(100));
        assert!(metrics.last_request_time.is_some());
    }

    #[tokio::test]
    async fn test_route_metrics() {
        let collector = MetricsCollector::new();
        collector.record_request(sample("/user/{name}/about", true, 200)).await;

        let metrics = collector.get_metrics().await;
        let route = &metrics.requests_by_route["/user/{name}/about"];
        assert_eq!(route.request_count, 1);
        assert_eq!(route.success_rate(), 1.0);
        assert_eq!(route.average_response_time(), Duration::from_millis(200));
        assert!(!metrics.requests_by_route.contains_key("/r/{sub}/hot"));
    }

    #[tokio::test]
    async fn test_source_status_summarises_routes_and_limits() {
        let collector = MetricsCollector::new();
        collector.record_request(sample("/r/{sub}/hot", true, 120)).await;
        collector.record_request(sample("/r/{sub}/hot", false, 80)).await;
        collector.record_request(sample("/user/{name}/about", true, 40)).await;

        let limits = RateLimitStatus {
            available_tokens: 1,
            max_tokens: 10,
            available_permits: 10,
            max_permits: 10,
            requests_per_minute: 100,
            estimated_wait_time: None,
        };
        let status = SourceStatus::from_parts(&collector.get_metrics().await, &limits, "closed", 2);

        assert_eq!(status.total_requests, 3);
        assert_eq!(status.failed_requests, 1);
        assert_eq!(status.rate_limited_requests, 1);
        assert_eq!(status.avg_response_ms, 80);
        assert_eq!(status.routes["/r/{sub}/hot"].requests, 2);
        assert_eq!(status.routes["/r/{sub}/hot"].success_rate, 0.5);
        assert_eq!(
            status.routes["/r/{sub}/hot"].last_error.as_deref(),
            Some("rate_limited")
        );
        assert_eq!(status.rate_limit_utilization, 90.0);
        assert!(status.near_rate_limit);
        assert_eq!(status.circuit_breaker, "closed");
        assert_eq!(status.total_retries, 2);
    }
}
