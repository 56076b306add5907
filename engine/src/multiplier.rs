//! Offering-count multiplier (spec.md §4.D): additional pre-sales load when a
//! service line must cover many distinct offerings in one deal.

use shared::{OpportunityLineItem, ServiceLineOfferingMapping, ServiceLineOfferingThreshold};
use std::collections::HashSet;

pub fn multiplier(
    mappings: &[ServiceLineOfferingMapping],
    line_items: &[OpportunityLineItem],
    threshold: Option<&ServiceLineOfferingThreshold>,
    service_line: shared::ServiceLine,
) -> f64 {
    let mapped: HashSet<(&str, &str)> = mappings
        .iter()
        .filter(|m| m.service_line == service_line)
        .map(|m| (m.internal_service.as_str(), m.simplified_offering.as_str()))
        .collect();

    if mapped.is_empty() {
        return 1.0;
    }

    let distinct_offerings: HashSet<&str> = line_items
        .iter()
        .filter_map(|item| {
            let internal = item.internal_service.as_deref()?.trim();
            let offering = item.simplified_offering.as_deref()?.trim();
            if offering.is_empty() {
                return None;
            }
            mapped.contains(&(internal, offering)).then_some(offering)
        })
        .collect();

    let k = distinct_offerings.len() as u32;

    let Some(threshold) = threshold else {
        return 1.0;
    };

    if k <= threshold.threshold_count {
        1.0
    } else {
        1.0 + (k - threshold.threshold_count) as f64 * threshold.increment_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ServiceLine;

    fn mapping(service_line: ServiceLine, internal: &str, offering: &str) -> ServiceLineOfferingMapping {
        ServiceLineOfferingMapping {
            service_line,
            internal_service: internal.into(),
            simplified_offering: offering.into(),
        }
    }

    fn item(internal: &str, offering: &str) -> OpportunityLineItem {
        OpportunityLineItem {
            opportunity_id: "opp-1".into(),
            internal_service: Some(internal.into()),
            simplified_offering: Some(offering.into()),
        }
    }

    #[test]
    fn no_mappings_is_no_multiplier() {
        assert_eq!(multiplier(&[], &[], None, ServiceLine::Mw), 1.0);
    }

    #[test]
    fn no_threshold_row_is_no_multiplier() {
        let mappings = vec![mapping(ServiceLine::Mw, "Cloud", "o1")];
        let items = vec![item("Cloud", "o1")];
        assert_eq!(multiplier(&mappings, &items, None, ServiceLine::Mw), 1.0);
    }

    #[test]
    fn under_threshold_is_no_multiplier() {
        let mappings = vec![
            mapping(ServiceLine::Mw, "Cloud", "o1"),
            mapping(ServiceLine::Mw, "Cloud", "o2"),
        ];
        let items = vec![item("Cloud", "o1"), item("Cloud", "o2")];
        let threshold = ServiceLineOfferingThreshold {
            service_line: ServiceLine::Mw,
            stage_name: shared::Stage::S04A,
            threshold_count: 4,
            increment_multiplier: 0.2,
        };
        assert_eq!(multiplier(&mappings, &items, Some(&threshold), ServiceLine::Mw), 1.0);
    }

    #[test]
    fn scenario_two_six_offerings_over_threshold_four() {
        let mappings: Vec<_> = (1..=6)
            .map(|n| mapping(ServiceLine::Mw, "Cloud", &format!("o{n}")))
            .collect();
        let items: Vec<_> = (1..=6).map(|n| item("Cloud", &format!("o{n}"))).collect();
        let threshold = ServiceLineOfferingThreshold {
            service_line: ServiceLine::Mw,
            stage_name: shared::Stage::S04A,
            threshold_count: 4,
            increment_multiplier: 0.2,
        };
        let m = multiplier(&mappings, &items, Some(&threshold), ServiceLine::Mw);
        assert!((m - 1.4).abs() < 1e-9);
    }
}
