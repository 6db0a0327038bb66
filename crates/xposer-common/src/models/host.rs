//! 主机名模板
//!
//! 支持 `{name}`、`{namespace}`、`{domain}` 三个占位符，渲染结果必须是
//! 合法的 RFC 1123 子域名。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PolicyError;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]*)\}").unwrap());

static DNS_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

/// 子域名最大长度
pub const MAX_HOST_LENGTH: usize = 253;

/// 模板变量
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// Service 名称
    pub name: &'a str,
    /// Service 命名空间
    pub namespace: &'a str,
    /// 集群域名
    pub domain: &'a str,
}

/// 渲染模板，遇到未知占位符或未闭合的括号时报错
pub fn render_template(template: &str, vars: &TemplateVars<'_>) -> Result<String, PolicyError> {
    let mut unknown = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        match &caps[1] {
            "name" => vars.name.to_string(),
            "namespace" => vars.namespace.to_string(),
            "domain" => vars.domain.to_string(),
            other => {
                unknown.get_or_insert_with(|| other.to_string());
                String::new()
            }
        }
    });

    if let Some(placeholder) = unknown {
        return Err(PolicyError::InvalidTemplate(format!(
            "{template}: 未知占位符 {{{placeholder}}}"
        )));
    }
    if rendered.contains('{') || rendered.contains('}') {
        return Err(PolicyError::InvalidTemplate(format!("{template}: 括号不匹配")));
    }

    Ok(rendered.into_owned())
}

/// 校验主机名是否为合法的 RFC 1123 子域名
pub fn validate_host(host: &str) -> Result<(), PolicyError> {
    if host.is_empty() || host.len() > MAX_HOST_LENGTH {
        return Err(PolicyError::InvalidHost(host.to_string()));
    }
    if !host.split('.').all(|label| label.len() <= 63 && DNS_LABEL.is_match(label)) {
        return Err(PolicyError::InvalidHost(host.to_string()));
    }
    Ok(())
}

/// 渲染模板并校验结果
pub fn render_host(template: &str, vars: &TemplateVars<'_>) -> Result<String, PolicyError> {
    let host = render_template(template, vars)?;
    validate_host(&host)?;
    Ok(host)
}
