// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 The stellar-anchor developers

//! # Discovery Document (SEP-1)
//!
//! Renders the `stellar.toml` discovery document from the configuration and
//! the set of mounted modules. Rendering is deterministic, so the result is
//! cached; the cache is invalidated only when the mount set changes.
//!
//! Emission order is fixed: signing key and network passphrase first, then
//! one endpoint key per mounted module, then the documentation block, then
//! one `[[CURRENCIES]]` section per configured asset.

use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use crate::config::{AnchorConfig, AssetConfig, AssetStatus};

/// Which SEP modules are currently mounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountSet {
    pub sep10: bool,
    pub sep24: bool,
    pub sep6: bool,
}

pub struct DiscoveryPublisher {
    config: Arc<AnchorConfig>,
    mounts: RwLock<MountSet>,
    cache: RwLock<Option<Arc<String>>>,
}

impl DiscoveryPublisher {
    pub fn new(config: Arc<AnchorConfig>) -> Self {
        Self {
            config,
            mounts: RwLock::new(MountSet::default()),
            cache: RwLock::new(None),
        }
    }

    pub fn mounts(&self) -> MountSet {
        *self.mounts.read().expect("mount lock poisoned")
    }

    /// Mutate the mount set. Any change drops the cached rendering.
    pub fn set_mounts(&self, mutate: impl FnOnce(&mut MountSet)) {
        let mut mounts = self.mounts.write().expect("mount lock poisoned");
        let before = *mounts;
        mutate(&mut mounts);
        if *mounts != before {
            *self.cache.write().expect("cache lock poisoned") = None;
        }
    }

    /// Render the document, memoized per mount set.
    pub fn render(&self) -> Arc<String> {
        if let Some(cached) = self.cache.read().expect("cache lock poisoned").as_ref() {
            return cached.clone();
        }

        let rendered = Arc::new(self.build(self.mounts()));
        *self.cache.write().expect("cache lock poisoned") = Some(rendered.clone());
        rendered
    }

    fn build(&self, mounts: MountSet) -> String {
        let config = &self.config;
        let base = config.base_url();
        let mut out = String::new();

        emit_str(&mut out, "SIGNING_KEY", &config.signing_account());
        emit_str(&mut out, "NETWORK_PASSPHRASE", config.passphrase());

        if mounts.sep10 {
            emit_str(&mut out, "WEB_AUTH_ENDPOINT", &format!("{base}/auth"));
        }
        if mounts.sep24 {
            emit_str(&mut out, "TRANSFER_SERVER_SEP0024", &format!("{base}/sep24"));
        }
        if mounts.sep6 {
            emit_str(&mut out, "TRANSFER_SERVER", &format!("{base}/sep6"));
        }

        if let Some(docs) = &config.documentation {
            out.push_str("\n[DOCUMENTATION]\n");
            let fields = [
                ("org_name", &docs.org_name),
                ("org_url", &docs.org_url),
                ("org_description", &docs.org_description),
                ("org_logo", &docs.org_logo),
                ("org_physical_address", &docs.org_physical_address),
                ("org_official_email", &docs.org_official_email),
                ("org_support_email", &docs.org_support_email),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    emit_str(&mut out, key, value);
                }
            }
        }

        for (code, asset) in &config.assets {
            out.push_str("\n[[CURRENCIES]]\n");
            self.emit_currency(&mut out, code, asset);
        }

        out
    }

    fn emit_currency(&self, out: &mut String, code: &str, asset: &AssetConfig) {
        let code = if code.eq_ignore_ascii_case("native") || code.eq_ignore_ascii_case("XLM") {
            "native"
        } else {
            code
        };
        emit_str(out, "code", code);

        if let Some(issuer) = &asset.issuer {
            emit_str(out, "issuer", issuer);
        }

        let status = match asset.status {
            Some(AssetStatus::Live) => Some("live"),
            Some(AssetStatus::Test) => Some("test"),
            Some(AssetStatus::Dead) | Some(AssetStatus::Private) => None,
            None => Some(if self.config.network.is_production() {
                "live"
            } else {
                "test"
            }),
        };
        if let Some(status) = status {
            emit_str(out, "status", status);
        }

        let _ = writeln!(out, "display_decimals = {}", asset.display_decimals);

        if let Some(name) = &asset.name {
            emit_str(out, "name", name);
        }
        if let Some(desc) = &asset.desc {
            emit_str(out, "desc", desc);
        }
    }
}

fn emit_str(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{key} = \"{}\"", toml_escape(value));
}

/// Backslash-escape for double-quoted TOML strings.
fn toml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;
    use crate::config::{AssetConfig, DocumentationConfig, Network, OperationConfig};

    fn publisher() -> DiscoveryPublisher {
        DiscoveryPublisher::new(Arc::new(test_config()))
    }

    #[test]
    fn required_pair_is_always_first() {
        let publisher = publisher();
        let doc = publisher.render();
        let mut lines = doc.lines();
        assert!(lines.next().unwrap().starts_with("SIGNING_KEY = \"G"));
        assert!(lines
            .next()
            .unwrap()
            .starts_with("NETWORK_PASSPHRASE = \"Test SDF Network"));
    }

    #[test]
    fn endpoint_keys_follow_mount_set() {
        let publisher = publisher();
        publisher.set_mounts(|m| m.sep10 = true);

        let doc = publisher.render();
        assert!(doc.contains("WEB_AUTH_ENDPOINT = \"https://anchor.example.com/auth\""));
        assert!(!doc.contains("TRANSFER_SERVER_SEP0024"));
        assert!(!doc.contains("TRANSFER_SERVER = "));

        publisher.set_mounts(|m| m.sep24 = true);
        let doc = publisher.render();
        assert!(doc.contains("TRANSFER_SERVER_SEP0024 = \"https://anchor.example.com/sep24\""));

        publisher.set_mounts(|m| m.sep6 = true);
        let doc = publisher.render();
        assert!(doc.contains("TRANSFER_SERVER = \"https://anchor.example.com/sep6\""));
    }

    #[test]
    fn localhost_domains_use_plain_http() {
        let mut config = test_config();
        config.domain = "localhost:8000".to_string();
        let publisher = DiscoveryPublisher::new(Arc::new(config));
        publisher.set_mounts(|m| m.sep10 = true);

        let doc = publisher.render();
        assert!(doc.contains("WEB_AUTH_ENDPOINT = \"http://localhost:8000/auth\""));
    }

    #[test]
    fn rendering_is_cached_until_mounts_change() {
        let publisher = publisher();
        let first = publisher.render();
        let second = publisher.render();
        assert!(Arc::ptr_eq(&first, &second));

        publisher.set_mounts(|m| m.sep10 = true);
        let third = publisher.render();
        assert!(!Arc::ptr_eq(&second, &third));

        // No-op mutation keeps the cache.
        publisher.set_mounts(|m| m.sep10 = true);
        let fourth = publisher.render();
        assert!(Arc::ptr_eq(&third, &fourth));
    }

    #[test]
    fn one_currency_section_per_asset_with_native_normalized() {
        let mut config = test_config();
        config.assets.insert(
            "XLM".to_string(),
            AssetConfig {
                issuer: None,
                name: Some("Lumens".to_string()),
                desc: None,
                display_decimals: 7,
                status: None,
                deposit: OperationConfig {
                    enabled: true,
                    ..Default::default()
                },
                withdraw: OperationConfig::default(),
            },
        );
        let publisher = DiscoveryPublisher::new(Arc::new(config));

        let doc = publisher.render();
        assert_eq!(doc.matches("[[CURRENCIES]]").count(), 2);
        assert!(doc.contains("code = \"native\""));
        assert!(!doc.contains("code = \"XLM\""));
        assert!(doc.contains("code = \"USDC\""));
    }

    #[test]
    fn status_derivation_rules() {
        let mut config = test_config();
        config
            .assets
            .get_mut("USDC")
            .unwrap()
            .status = Some(crate::config::AssetStatus::Private);
        let publisher = DiscoveryPublisher::new(Arc::new(config));
        assert!(!publisher.render().contains("status = "));

        // No explicit status: defaults per network.
        let publisher = DiscoveryPublisher::new(Arc::new(test_config()));
        assert!(publisher.render().contains("status = \"test\""));

        let mut config = test_config();
        config.network = Network::Public;
        let publisher = DiscoveryPublisher::new(Arc::new(config));
        assert!(publisher.render().contains("status = \"live\""));
    }

    #[test]
    fn documentation_block_emits_configured_fields_only() {
        let mut config = test_config();
        config.documentation = Some(DocumentationConfig {
            org_name: Some("Example Anchor Org".to_string()),
            org_url: Some("https://example.com".to_string()),
            ..Default::default()
        });
        let publisher = DiscoveryPublisher::new(Arc::new(config));

        let doc = publisher.render();
        assert!(doc.contains("[DOCUMENTATION]"));
        assert!(doc.contains("org_name = \"Example Anchor Org\""));
        assert!(!doc.contains("org_support_email"));
    }

    #[test]
    fn escaping_keeps_document_parseable() {
        let mut config = test_config();
        config.documentation = Some(DocumentationConfig {
            org_name: Some("Quote \" backslash \\ tab\tnewline\n".to_string()),
            ..Default::default()
        });
        let publisher = DiscoveryPublisher::new(Arc::new(config));

        let doc = publisher.render();
        let parsed: toml::Value = doc.parse().expect("document must parse as TOML");
        assert_eq!(
            parsed["DOCUMENTATION"]["org_name"].as_str().unwrap(),
            "Quote \" backslash \\ tab\tnewline\n"
        );
    }

    #[test]
    fn roundtrip_preserves_key_set() {
        let mut config = test_config();
        config.documentation = Some(DocumentationConfig {
            org_name: Some("Example".to_string()),
            ..Default::default()
        });
        let publisher = DiscoveryPublisher::new(Arc::new(config));
        publisher.set_mounts(|m| {
            m.sep10 = true;
            m.sep24 = true;
            m.sep6 = true;
        });

        let doc = publisher.render();
        let parsed: toml::Value = doc.parse().expect("document must parse as TOML");

        let table = parsed.as_table().unwrap();
        for key in [
            "SIGNING_KEY",
            "NETWORK_PASSPHRASE",
            "WEB_AUTH_ENDPOINT",
            "TRANSFER_SERVER_SEP0024",
            "TRANSFER_SERVER",
            "DOCUMENTATION",
            "CURRENCIES",
        ] {
            assert!(table.contains_key(key), "missing key {key}");
        }

        let currencies = parsed["CURRENCIES"].as_array().unwrap();
        assert_eq!(currencies.len(), 1);
        let usdc = currencies[0].as_table().unwrap();
        for key in ["code", "issuer", "status", "display_decimals", "name", "desc"] {
            assert!(usdc.contains_key(key), "missing currency key {key}");
        }
        assert_eq!(usdc["display_decimals"].as_integer(), Some(7));
    }
}
