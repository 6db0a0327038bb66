//! Ingress 生成与比较

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};

use super::ExposureSpec;

const PATH_TYPE: &str = "Prefix";

/// 渲染 Ingress：单条规则、单个路径，按需附带 TLS
pub fn render(spec: &ExposureSpec) -> Ingress {
    let port = match &spec.port.name {
        Some(name) => ServiceBackendPort {
            name: Some(name.clone()),
            number: None,
        },
        None => ServiceBackendPort {
            name: None,
            number: Some(spec.port.number),
        },
    };

    let rule = IngressRule {
        host: Some(spec.host.clone()),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some(spec.path.clone()),
                path_type: PATH_TYPE.to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: spec.key.name.clone(),
                        port: Some(port),
                    }),
                    resource: None,
                },
            }],
        }),
    };

    let tls = spec.tls.as_ref().map(|tls| {
        vec![IngressTLS {
            hosts: Some(vec![spec.host.clone()]),
            secret_name: tls.secret_name.clone(),
        }]
    });

    Ingress {
        metadata: spec.metadata(),
        spec: Some(IngressSpec {
            ingress_class_name: spec.ingress_class.clone(),
            rules: Some(vec![rule]),
            tls,
            default_backend: None,
        }),
        status: None,
    }
}

/// 比较规则、TLS，以及配置了类名时的 ingressClassName
pub fn matches(existing: &Ingress, desired: &Ingress) -> bool {
    let (Some(current), Some(wanted)) = (&existing.spec, &desired.spec) else {
        return false;
    };
    let class_matches =
        wanted.ingress_class_name.is_none() || current.ingress_class_name == wanted.ingress_class_name;

    class_matches && current.rules == wanted.rules && current.tls == wanted.tls
}

/// 生成更新请求体，未配置类名时保留准入控制器写入的默认类名
pub fn merge(existing: &Ingress, mut desired: Ingress) -> Ingress {
    if let (Some(current), Some(wanted)) = (&existing.spec, desired.spec.as_mut()) {
        if wanted.ingress_class_name.is_none() {
            wanted.ingress_class_name = current.ingress_class_name.clone();
        }
        if wanted.default_backend.is_none() {
            wanted.default_backend = current.default_backend.clone();
        }
    }
    desired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::policy::desired_spec;
    use crate::testing::{exposed_service, test_config};
    use kube::ResourceExt;

    fn desired(tls: bool) -> Ingress {
        let mut svc = exposed_service("ns", "foo");
        if tls {
            svc.annotations_mut()
                .insert("xposer.stakater.com/tls".into(), "true".into());
        }
        render(&desired_spec(&svc, &test_config()).unwrap())
    }

    #[test]
    fn test_render_ingress() {
        let ingress = desired(true);
        let spec = ingress.spec.as_ref().unwrap();
        let rule = &spec.rules.as_ref().unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("foo.ns.example.com"));

        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/"));
        assert_eq!(path.path_type, "Prefix");
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "foo");
        assert_eq!(backend.port.as_ref().unwrap().name.as_deref(), Some("http"));

        let tls = &spec.tls.as_ref().unwrap()[0];
        assert_eq!(tls.hosts, Some(vec!["foo.ns.example.com".to_string()]));
        assert_eq!(tls.secret_name.as_deref(), Some("foo-tls"));
        assert_eq!(ingress.metadata.name.as_deref(), Some("foo"));
    }

    #[test]
    fn test_matches_detects_host_drift() {
        let wanted = desired(false);
        let mut edited = wanted.clone();
        edited.spec.as_mut().unwrap().rules.as_mut().unwrap()[0].host =
            Some("hijacked.example.com".into());
        assert!(!matches(&edited, &wanted));
        assert!(!matches(&desired(true), &wanted));
    }

    #[test]
    fn test_defaulted_ingress_class_is_kept() {
        let wanted = desired(false);
        let mut existing = wanted.clone();
        existing.spec.as_mut().unwrap().ingress_class_name = Some("nginx".into());
        assert!(matches(&existing, &wanted));

        let merged = merge(&existing, wanted);
        assert_eq!(
            merged.spec.unwrap().ingress_class_name.as_deref(),
            Some("nginx")
        );
    }
}
