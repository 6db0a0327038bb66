//! Route 生成与比较

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use xposer_common::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};

use super::ExposureSpec;

const EDGE_TERMINATION: &str = "edge";
const REDIRECT_INSECURE: &str = "Redirect";

/// 渲染 Route
///
/// 目标端口优先使用 Service 端口名称，其次是目标端口，最后是端口号。
pub fn render(spec: &ExposureSpec) -> Route {
    let target_port = match (&spec.port.name, &spec.port.target_port) {
        (Some(name), _) => IntOrString::String(name.clone()),
        (None, Some(target)) => target.clone(),
        (None, None) => IntOrString::Int(spec.port.number),
    };

    let tls = spec.tls.as_ref().map(|_| TlsConfig {
        termination: EDGE_TERMINATION.to_string(),
        insecure_edge_termination_policy: Some(REDIRECT_INSECURE.to_string()),
        ..Default::default()
    });

    let mut route = Route::new(
        &spec.key.name,
        RouteSpec {
            host: Some(spec.host.clone()),
            path: Some(spec.path.clone()),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: spec.key.name.clone(),
                weight: Some(100),
            },
            port: Some(RoutePort { target_port }),
            tls,
            ..Default::default()
        },
    );
    route.metadata = spec.metadata();
    route
}

/// 比较主机名、路径、后端、端口和 TLS 终止方式
pub fn matches(existing: &Route, desired: &Route) -> bool {
    let current = &existing.spec;
    let wanted = &desired.spec;
    let tls_matches = match (&current.tls, &wanted.tls) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.termination == b.termination
                && a.insecure_edge_termination_policy == b.insecure_edge_termination_policy
        }
        _ => false,
    };

    current.host == wanted.host
        && current.path == wanted.path
        && current.to.kind == wanted.to.kind
        && current.to.name == wanted.to.name
        && current.port == wanted.port
        && tls_matches
}

/// 生成更新请求体
///
/// 保留服务端写入的通配符策略，以及其他工具写入的未建模字段（备用后端、证书等）。
pub fn merge(existing: &Route, mut desired: Route) -> Route {
    if desired.spec.wildcard_policy.is_none() {
        desired.spec.wildcard_policy = existing.spec.wildcard_policy.clone();
    }
    desired.spec.extra = existing.spec.extra.clone();
    if let (Some(current), Some(wanted)) = (&existing.spec.tls, desired.spec.tls.as_mut()) {
        wanted.extra = current.extra.clone();
    }
    desired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::policy::desired_spec;
    use crate::testing::{exposed_service, test_config};
    use kube::ResourceExt;

    fn desired(tls: bool) -> Route {
        let mut svc = exposed_service("ns", "foo");
        if tls {
            svc.annotations_mut()
                .insert("xposer.stakater.com/tls".into(), "true".into());
        }
        render(&desired_spec(&svc, &test_config()).unwrap())
    }

    #[test]
    fn test_render_route() {
        let route = desired(true);
        assert_eq!(route.spec.host.as_deref(), Some("foo.ns.example.com"));
        assert_eq!(route.spec.path.as_deref(), Some("/"));
        assert_eq!(route.spec.to.name, "foo");
        assert_eq!(
            route.spec.port,
            Some(RoutePort { target_port: IntOrString::String("http".into()) })
        );
        let tls = route.spec.tls.as_ref().unwrap();
        assert_eq!(tls.termination, "edge");
        assert_eq!(route.metadata.namespace.as_deref(), Some("ns"));
    }

    #[test]
    fn test_server_defaults_do_not_cause_drift() {
        let wanted = desired(false);
        let mut existing = wanted.clone();
        existing.spec.wildcard_policy = Some("None".into());
        existing.spec.to.weight = Some(100);
        assert!(matches(&existing, &wanted));

        let merged = merge(&existing, wanted);
        assert_eq!(merged.spec.wildcard_policy.as_deref(), Some("None"));
    }

    #[test]
    fn test_merge_keeps_fields_owned_by_others() {
        let wanted = desired(true);
        let mut existing = wanted.clone();
        existing.spec.host = Some("old.example.com".into());
        existing.spec.extra.insert(
            "alternateBackends".into(),
            serde_json::json!([{ "kind": "Service", "name": "canary", "weight": 10 }]),
        );
        existing
            .spec
            .tls
            .as_mut()
            .unwrap()
            .extra
            .insert("certificate".into(), serde_json::json!("CERT"));

        let merged = merge(&existing, wanted);
        assert_eq!(merged.spec.host.as_deref(), Some("foo.ns.example.com"));
        assert!(merged.spec.extra.contains_key("alternateBackends"));
        assert_eq!(merged.spec.tls.as_ref().unwrap().extra["certificate"], "CERT");

        // 关闭 TLS 时整个 tls 段由 Xposer 移除
        let merged = merge(&existing, desired(false));
        assert!(merged.spec.tls.is_none());
        assert!(merged.spec.extra.contains_key("alternateBackends"));
    }

    #[test]
    fn test_matches_detects_drift() {
        let wanted = desired(false);
        let mut edited = wanted.clone();
        edited.spec.host = Some("other.example.com".into());
        assert!(!matches(&edited, &wanted));
        assert!(!matches(&desired(true), &wanted));
    }
}
