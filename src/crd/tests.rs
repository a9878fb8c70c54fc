//! Unit tests for ManagedCertificate spec validation and CRD generation

#[cfg(test)]
mod managed_certificate_spec_validation {
    use crate::crd::{v1beta1, ManagedCertificateSpec, MAX_DOMAINS_V1BETA2};

    fn spec(domains: &[&str]) -> ManagedCertificateSpec {
        ManagedCertificateSpec {
            domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_single_domain() {
        assert!(spec(&["a.example.com"]).validate().is_ok());
    }

    #[test]
    fn test_trailing_dot_is_accepted() {
        assert!(spec(&["example.com."]).validate().is_ok());
    }

    #[test]
    fn test_empty_domains_rejected() {
        let err = spec(&[]).validate().unwrap_err();
        assert_eq!(err.field, "spec.domains");
    }

    #[test]
    fn test_wildcard_rejected() {
        let err = spec(&["*.example.com"]).validate().unwrap_err();
        assert_eq!(err.field, "spec.domains[0]");
    }

    #[test]
    fn test_single_label_rejected() {
        assert!(spec(&["localhost"]).validate().is_err());
    }

    #[test]
    fn test_domain_too_long_rejected() {
        let long = format!("{}.com", "a".repeat(60));
        let err = spec(&["ok.example.com", &long]).validate().unwrap_err();
        assert_eq!(err.field, "spec.domains[1]");
        assert!(err.message.contains("longer than 63"));
    }

    #[test]
    fn test_v1beta2_domain_limit() {
        let domains: Vec<String> = (0..=MAX_DOMAINS_V1BETA2)
            .map(|i| format!("d{i}.example.com"))
            .collect();
        let too_many = ManagedCertificateSpec { domains };
        assert!(too_many.validate().is_err());

        let mut domains = too_many.domains;
        domains.pop();
        assert!(ManagedCertificateSpec { domains }.validate().is_ok());
    }

    #[test]
    fn test_v1beta1_allows_exactly_one_domain() {
        let one = v1beta1::ManagedCertificateSpec {
            domains: vec!["a.example.com".to_string()],
        };
        assert!(one.validate().is_ok());

        let two = v1beta1::ManagedCertificateSpec {
            domains: vec!["a.example.com".to_string(), "b.example.com".to_string()],
        };
        assert!(two.validate().is_err());
    }
}

#[cfg(test)]
mod managed_certificate_crd {
    use crate::crd::{managed_certificate_crd, ManagedCertificate, ManagedCertificateStatus};
    use kube::api::ObjectMeta;

    #[test]
    fn test_merged_crd_serves_both_versions() {
        let crd = managed_certificate_crd().unwrap();
        assert_eq!(crd.metadata.name.as_deref(), Some("managedcertificates.networking.gke.io"));

        let versions: Vec<(&str, bool)> = crd
            .spec
            .versions
            .iter()
            .map(|v| (v.name.as_str(), v.storage))
            .collect();
        assert!(versions.contains(&("v1beta1", false)));
        assert!(versions.contains(&("v1beta2", true)));
    }

    #[test]
    fn test_domain_schema_limits() {
        let crd = managed_certificate_crd().unwrap();
        let json = serde_json::to_value(&crd).unwrap();
        let versions = json["spec"]["versions"].as_array().unwrap();

        for version in versions {
            let domains = &version["schema"]["openAPIV3Schema"]["properties"]["spec"]
                ["properties"]["domains"];
            let expected_max = if version["name"] == "v1beta1" { 1 } else { 100 };
            assert_eq!(domains["maxItems"], expected_max);
            assert_eq!(domains["items"]["maxLength"], 63);
            assert!(domains["items"]["pattern"].is_string());
        }
    }

    #[test]
    fn test_status_round_trips_camel_case() {
        let status_json = serde_json::json!({
            "certificateName": "mcrt-123",
            "certificateStatus": "Active",
            "domainStatus": [{"domain": "a.example.com", "status": "Active"}],
            "expireTime": "2027-01-01T00:00:00Z"
        });
        let status: ManagedCertificateStatus = serde_json::from_value(status_json).unwrap();
        assert_eq!(status.certificate_name.as_deref(), Some("mcrt-123"));
        assert_eq!(status.domain_status.len(), 1);

        let mcrt = ManagedCertificate {
            metadata: ObjectMeta::default(),
            spec: Default::default(),
            status: Some(status),
        };
        assert_eq!(mcrt.status_certificate_name(), Some("mcrt-123"));
    }

    #[test]
    fn test_empty_status_certificate_name_is_ignored() {
        let mcrt = ManagedCertificate {
            metadata: ObjectMeta::default(),
            spec: Default::default(),
            status: Some(ManagedCertificateStatus {
                certificate_name: Some(String::new()),
                ..Default::default()
            }),
        };
        assert_eq!(mcrt.status_certificate_name(), None);
    }
}
