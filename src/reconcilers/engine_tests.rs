// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `engine.rs`

#[cfg(test)]
mod tests {
    use super::super::RewriteEngine;
    use crate::config::ControllerSettings;
    use crate::constants::DEFAULT_REWRITE_ANNOTATION;
    use crate::corefile::is_rewrite_directive;
    use crate::request_queue::{RewriteEvent, RewriteRequest};
    use std::collections::{BTreeMap, HashSet};

    const COREFILE: &str = ".:53 {
    errors
    health {
        lameduck 5s
    }
    ready
    kubernetes cluster.local in-addr.arpa ip6.arpa {
        pods insecure
        fallthrough in-addr.arpa ip6.arpa
    }
    prometheus :9153
    forward . \"/etc/resolv.conf\"
    cache 30
    loop
    reload
    loadbalance
}";

    fn with_rewrite(line: &str) -> String {
        COREFILE.replacen(".:53 {\n", &format!(".:53 {{\n{line}\n"), 1)
    }

    fn engine() -> RewriteEngine {
        RewriteEngine::from_settings(&ControllerSettings::default())
    }

    fn annotations(domain: &str) -> BTreeMap<String, String> {
        BTreeMap::from([(DEFAULT_REWRITE_ANNOTATION.to_string(), domain.to_string())])
    }

    // ========================================================================
    // Scenario Tests
    // ========================================================================

    #[test]
    fn test_add_rewrite_to_corefile_without_rules() {
        let engine = engine();
        engine.handle_corefile(COREFILE);
        assert_eq!(engine.rewrites_len(), 0);

        let accepted = engine.handle_service_annotations(
            RewriteEvent::Added,
            "test",
            "default",
            Some(&annotations("mytest.site.wsx")),
        );
        assert!(accepted);

        let patched = engine.reconcile(COREFILE).expect("corefile should change");
        assert_eq!(
            patched,
            with_rewrite("    rewrite name mytest.site.wsx test.default.svc.cluster.local")
        );
    }

    #[test]
    fn test_existing_rewrite_is_recognized() {
        let engine = engine();
        let corefile =
            with_rewrite("    rewrite name mytest.site.wsx test.default.svc.cluster.local");
        engine.handle_corefile(&corefile);
        assert_eq!(engine.rewrites_len(), 1);

        assert!(engine.has_rewrite(&RewriteRequest::new(
            RewriteEvent::Added,
            "mytest.site.wsx",
            "test",
            "default"
        )));
        assert!(!engine.has_rewrite(&RewriteRequest::new(
            RewriteEvent::Added,
            "mytest.site.wsx",
            "foo",
            "default"
        )));
        assert_eq!(engine.reconcile(&corefile), None);
    }

    #[test]
    fn test_new_domain_for_same_service_evicts_old_domain() {
        let engine = engine();
        let corefile =
            with_rewrite("    rewrite name mytest.site.wsx test.default.svc.cluster.local");
        engine.handle_corefile(&corefile);

        engine.handle_service_annotations(
            RewriteEvent::Added,
            "test",
            "default",
            Some(&annotations("test.site.wsx")),
        );

        let patched = engine.reconcile(&corefile).expect("corefile should change");
        assert_eq!(
            patched,
            with_rewrite("    rewrite name test.site.wsx test.default.svc.cluster.local")
        );
        assert!(engine.has_rewrite(&RewriteRequest::new(
            RewriteEvent::Added,
            "test.site.wsx",
            "test",
            "default"
        )));
        assert_eq!(engine.rewrites_len(), 1);
    }

    // ========================================================================
    // Readiness Tests
    // ========================================================================

    #[test]
    fn test_reconcile_before_snapshot_is_noop_and_keeps_requests() {
        let engine = engine();
        assert!(!engine.is_ready());
        engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default");

        assert_eq!(engine.reconcile(COREFILE), None);
        assert_eq!(engine.pending_requests(), 1, "requests wait for readiness");

        engine.handle_corefile(COREFILE);
        assert!(engine.is_ready());
        assert!(engine.reconcile(COREFILE).is_some());
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_reconcile_latest_uses_cached_corefile() {
        let engine = engine();
        assert_eq!(engine.reconcile_latest(), None);

        engine.handle_corefile(COREFILE);
        engine.handle_service(RewriteEvent::Updated, Some("a.example.com"), "a", "web");

        let patched = engine.reconcile_latest().unwrap();
        assert_eq!(
            patched,
            with_rewrite("    rewrite name a.example.com a.web.svc.cluster.local")
        );
    }

    // ========================================================================
    // Request Intake Tests
    // ========================================================================

    #[test]
    fn test_service_without_annotation_is_ignored() {
        let engine = engine();
        assert!(!engine.handle_service_annotations(RewriteEvent::Added, "a", "default", None));

        let other = BTreeMap::from([("team".to_string(), "payments".to_string())]);
        assert!(!engine.handle_service_annotations(
            RewriteEvent::Added,
            "a",
            "default",
            Some(&other)
        ));
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_blank_annotation_is_ignored() {
        let engine = engine();
        assert!(!engine.handle_service(RewriteEvent::Added, Some("   "), "a", "default"));
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_annotation_value_is_trimmed() {
        let engine = engine();
        engine.handle_corefile(COREFILE);
        engine.handle_service(RewriteEvent::Added, Some(" a.example.com\n"), "a", "default");
        engine.reconcile(COREFILE).unwrap();
        assert!(engine.has_rewrite(&RewriteRequest::new(
            RewriteEvent::Added,
            "a.example.com",
            "a",
            "default"
        )));
    }

    #[test]
    fn test_invalid_domain_is_rejected() {
        let engine = engine();
        for domain in ["*.example.com", "foo bar", "-x", ".example.com", "a.example.com."] {
            assert!(
                !engine.handle_service(RewriteEvent::Added, Some(domain), "web", "default"),
                "{domain:?} should be rejected"
            );
        }
        assert_eq!(engine.pending_requests(), 0);
    }

    #[test]
    fn test_invalid_domain_leaves_corefile_unchanged_across_passes() {
        let engine = engine();
        let mut corefile =
            with_rewrite("    rewrite name a.example.com a.default.svc.cluster.local");

        for _ in 0..3 {
            engine.handle_corefile(&corefile);
            engine.handle_service(RewriteEvent::Updated, Some("*.example.com"), "web", "default");
            engine.handle_service(RewriteEvent::Updated, Some("a.example.com"), "a", "default");
            if let Some(patched) = engine.reconcile_latest() {
                corefile = patched;
            }
        }

        assert_eq!(
            corefile,
            with_rewrite("    rewrite name a.example.com a.default.svc.cluster.local")
        );
        assert_eq!(corefile.matches("rewrite").count(), 1);
    }

    #[test]
    fn test_invalid_target_is_skipped() {
        let engine = RewriteEngine::new(DEFAULT_REWRITE_ANNOTATION, "cluster.local-");
        let corefile = ".:53 {\n    forward . 8.8.8.8\n}";
        engine.handle_corefile(corefile);
        assert!(engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default"));

        assert_eq!(engine.reconcile(corefile), None);
        assert_eq!(engine.pending_requests(), 0);
        assert_eq!(engine.rewrites_len(), 0);
    }

    #[test]
    fn test_custom_annotation_key() {
        let engine = RewriteEngine::new("example.com/dns", "cluster.local");
        let default_key = annotations("a.example.com");
        assert!(!engine.handle_service_annotations(
            RewriteEvent::Added,
            "a",
            "default",
            Some(&default_key)
        ));

        let custom = BTreeMap::from([("example.com/dns".to_string(), "a.example.com".to_string())]);
        assert!(engine.handle_service_annotations(
            RewriteEvent::Added,
            "a",
            "default",
            Some(&custom)
        ));
    }

    // ========================================================================
    // Reconciliation Semantics Tests
    // ========================================================================

    #[test]
    fn test_request_already_in_place_produces_no_change() {
        let engine = engine();
        let corefile = with_rewrite("    rewrite name a.example.com a.default.svc.cluster.local");
        engine.handle_corefile(&corefile);

        let request = RewriteRequest::new(RewriteEvent::Updated, "a.example.com", "a", "default");
        assert!(engine.has_rewrite(&request));
        engine.handle_service(RewriteEvent::Updated, Some("a.example.com"), "a", "default");

        assert_eq!(engine.reconcile(&corefile), None);
        assert_eq!(engine.pending_requests(), 0, "batch is consumed even without change");
    }

    #[test]
    fn test_empty_queue_produces_no_change() {
        let engine = engine();
        engine.handle_corefile(COREFILE);
        assert_eq!(engine.reconcile(COREFILE), None);
    }

    #[test]
    fn test_deleted_service_leaves_rule_in_place() {
        let engine = engine();
        let corefile = with_rewrite("    rewrite name a.example.com a.default.svc.cluster.local");
        engine.handle_corefile(&corefile);

        assert!(engine.handle_service(
            RewriteEvent::Deleted,
            Some("a.example.com"),
            "a",
            "default"
        ));
        assert_eq!(engine.reconcile(&corefile), None);
        assert_eq!(engine.rewrites_len(), 1);
    }

    #[test]
    fn test_service_moved_to_other_namespace_retargets_domain() {
        let engine = engine();
        let corefile = with_rewrite("    rewrite name a.example.com a.default.svc.cluster.local");
        engine.handle_corefile(&corefile);

        engine.handle_service(RewriteEvent::Updated, Some("a.example.com"), "a", "prod");
        let patched = engine.reconcile(&corefile).unwrap();

        assert!(patched.contains("    rewrite name a.example.com a.prod.svc.cluster.local"));
        assert!(!patched.contains("a.default.svc.cluster.local"));
    }

    #[test]
    fn test_batch_applies_requests_in_arrival_order() {
        let engine = engine();
        engine.handle_corefile(COREFILE);

        engine.handle_service(RewriteEvent::Added, Some("first.example.com"), "web", "default");
        engine.handle_service(RewriteEvent::Updated, Some("second.example.com"), "web", "default");

        let patched = engine.reconcile(COREFILE).unwrap();
        assert!(patched.contains("rewrite name second.example.com web.default.svc.cluster.local"));
        assert!(!patched.contains("first.example.com"));
    }

    #[test]
    fn test_rules_render_as_contiguous_block() {
        let engine = engine();
        engine.handle_corefile(COREFILE);
        engine.handle_service(RewriteEvent::Added, Some("b.example.com"), "b", "default");
        engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default");

        let patched = engine.reconcile(COREFILE).unwrap();
        let lines: Vec<&str> = patched.lines().collect();
        assert_eq!(lines[0], ".:53 {");
        assert_eq!(lines[1], "    rewrite name a.example.com a.default.svc.cluster.local");
        assert_eq!(lines[2], "    rewrite name b.example.com b.default.svc.cluster.local");
        assert_eq!(lines[3], "    errors");
    }

    #[test]
    fn test_non_rewrite_lines_survive_patch() {
        let engine = engine();
        let corefile = COREFILE.replacen(
            "    cache 30\n",
            "    cache 30\n    rewrite name old.example.com old.default.svc.cluster.local\n",
            1,
        );
        engine.handle_corefile(&corefile);
        engine.handle_service(RewriteEvent::Added, Some("new.example.com"), "new", "default");

        let patched = engine.reconcile(&corefile).unwrap();
        let kept: Vec<&str> = patched
            .split('\n')
            .filter(|line| !is_rewrite_directive(line))
            .collect();
        let original: Vec<&str> = COREFILE.split('\n').collect();
        assert_eq!(kept, original);
        assert!(patched.contains("rewrite name old.example.com"), "existing rules kept");
    }

    #[test]
    fn test_targets_stay_unique_across_passes() {
        let engine = engine();
        engine.handle_corefile(COREFILE);

        let requests = [
            ("a.example.com", "web"),
            ("b.example.com", "api"),
            ("c.example.com", "web"),
            ("a.example.com", "api"),
            ("d.example.com", "db"),
        ];
        for (domain, service) in requests {
            engine.handle_service(RewriteEvent::Added, Some(domain), service, "default");
            engine.reconcile_latest();
        }

        let rules = engine.status().rules;
        let targets: HashSet<&str> = rules.iter().map(|r| r.target_fqdn.as_str()).collect();
        assert_eq!(targets.len(), rules.len());
    }

    // ========================================================================
    // Snapshot Tests
    // ========================================================================

    #[test]
    fn test_snapshot_is_idempotent() {
        let engine = engine();
        let corefile = with_rewrite("    rewrite name a.example.com a.default.svc.cluster.local");
        engine.handle_corefile(&corefile);
        let first = engine.status().rules;
        engine.handle_corefile(&corefile);
        assert_eq!(engine.status().rules, first);
    }

    #[test]
    fn test_snapshot_replaces_in_memory_changes() {
        let engine = engine();
        engine.handle_corefile(COREFILE);
        engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default");
        engine.reconcile(COREFILE).unwrap();
        assert_eq!(engine.rewrites_len(), 1);

        // write-back never landed; the unchanged ConfigMap is observed again
        engine.handle_corefile(COREFILE);
        assert_eq!(engine.rewrites_len(), 0);
    }

    #[test]
    fn test_cluster_domain_from_snapshot() {
        let engine = engine();
        engine.handle_corefile(&COREFILE.replace(
            "kubernetes cluster.local",
            "kubernetes corp.internal",
        ));
        assert_eq!(engine.cluster_domain(), "corp.internal");

        engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default");
        let patched = engine.reconcile_latest().unwrap();
        assert!(patched.contains("rewrite name a.example.com a.default.svc.corp.internal"));
    }

    #[test]
    fn test_cluster_domain_with_root_dot_renders_valid_targets() {
        let engine = engine();
        engine.handle_corefile(&COREFILE.replace(
            "kubernetes cluster.local ",
            "kubernetes cluster.local. ",
        ));
        assert_eq!(engine.cluster_domain(), "cluster.local");

        engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default");
        let patched = engine.reconcile_latest().unwrap();
        assert!(patched
            .lines()
            .any(|line| line == "    rewrite name a.example.com a.default.svc.cluster.local"));

        engine.handle_corefile(&patched);
        assert_eq!(engine.rewrites_len(), 1);
    }

    #[test]
    fn test_cluster_domain_kept_when_directive_missing() {
        let engine = engine();
        engine.handle_corefile(&COREFILE.replace(
            "kubernetes cluster.local",
            "kubernetes corp.internal",
        ));
        engine.handle_corefile(".:53 {\n    forward . 8.8.8.8\n}");
        assert_eq!(engine.cluster_domain(), "corp.internal");
        assert!(engine.is_ready());
    }

    // ========================================================================
    // Concurrency Tests
    // ========================================================================

    #[test]
    fn test_snapshot_during_passes_never_drops_applied_requests() {
        let engine = engine();
        engine.handle_corefile(COREFILE);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    engine.handle_corefile(COREFILE);
                }
            });

            for i in 0..500 {
                let domain = format!("d{i}.example.com");
                let service = format!("s{i}");
                engine.handle_service(RewriteEvent::Added, Some(&domain), &service, "default");

                let patched = engine
                    .reconcile_latest()
                    .expect("a fresh domain always changes the table");
                let expected =
                    format!("    rewrite name {domain} {service}.default.svc.cluster.local");
                assert!(
                    patched.lines().any(|line| line == expected),
                    "pass {i} lost its own rule"
                );
            }
        });
    }

    #[test]
    fn test_status_snapshot() {
        let engine = engine();
        let status = engine.status();
        assert!(!status.ready);
        assert!(status.last_snapshot_at.is_none());

        engine.handle_corefile(COREFILE);
        engine.handle_service(RewriteEvent::Added, Some("a.example.com"), "a", "default");
        let status = engine.status();
        assert!(status.ready);
        assert_eq!(status.pending_requests, 1);
        assert!(status.last_snapshot_at.is_some());
        assert!(status.last_patch_at.is_none());

        engine.reconcile_latest();
        let status = engine.status();
        assert_eq!(status.rules.len(), 1);
        assert!(status.last_patch_at.is_some());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["clusterDomain"], "cluster.local");
        assert_eq!(json["rules"][0]["domainName"], "a.example.com");
    }
}
