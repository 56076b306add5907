//! Category resolution (spec.md §4.C): maps a monetary value onto a named
//! TCV band, globally and per service line.

use shared::{OpportunityCategory, ServiceLine, ServiceLineCategory};

/// Among all bands with `min_tcv <= tcv`, picks the one with the largest
/// `min_tcv`, requiring `tcv < max_tcv` when `max_tcv` is finite. Ties on
/// `min_tcv` are broken by highest `id`. If no band covers `tcv` (a gap in
/// the configured bands), falls back to the unbounded band (`max_tcv ==
/// None`) when one exists.
pub fn resolve_opportunity_category(categories: &[OpportunityCategory], tcv: f64) -> Option<String> {
    if tcv < 0.0 {
        return None;
    }
    best_band(
        categories.iter().filter(|c| c.min_tcv <= tcv && c.max_tcv.map_or(true, |max| tcv < max)),
        |c| (c.min_tcv, c.id),
    )
    .or_else(|| best_band(categories.iter().filter(|c| c.max_tcv.is_none()), |c| (c.min_tcv, c.id)))
    .map(|c| c.name.clone())
}

pub fn resolve_service_line_category(
    categories: &[ServiceLineCategory],
    service_line: ServiceLine,
    tcv: f64,
) -> Option<String> {
    if tcv <= 0.0 {
        return None;
    }
    best_band(
        categories
            .iter()
            .filter(|c| c.service_line == service_line && c.min_tcv <= tcv && c.max_tcv.map_or(true, |max| tcv < max)),
        |c| (c.min_tcv, c.id),
    )
    .or_else(|| {
        best_band(
            categories.iter().filter(|c| c.service_line == service_line && c.max_tcv.is_none()),
            |c| (c.min_tcv, c.id),
        )
    })
    .map(|c| c.name.clone())
}

fn best_band<'a, T>(iter: impl Iterator<Item = &'a T>, key: impl Fn(&T) -> (f64, i64)) -> Option<&'a T>
where
    T: 'a,
{
    iter.max_by(|a, b| {
        let (min_a, id_a) = key(a);
        let (min_b, id_b) = key(b);
        min_a
            .partial_cmp(&min_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(id_a.cmp(&id_b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(id: i64, min_tcv: f64, max_tcv: Option<f64>) -> OpportunityCategory {
        OpportunityCategory {
            id,
            name: format!("band-{id}"),
            min_tcv,
            max_tcv,
            stage_01_duration_weeks: 0,
            stage_02_duration_weeks: 0,
            stage_03_duration_weeks: 0,
            stage_04a_duration_weeks: 0,
            stage_04b_duration_weeks: 0,
            stage_05a_duration_weeks: 0,
            stage_05b_duration_weeks: 0,
            stage_06_duration_weeks: 0,
        }
    }

    #[test]
    fn negative_tcv_is_uncategorized() {
        let bands = vec![band(1, 0.0, None)];
        assert_eq!(resolve_opportunity_category(&bands, -1.0), None);
    }

    #[test]
    fn picks_largest_qualifying_min_tcv() {
        let bands = vec![band(1, 0.0, Some(5.0)), band(2, 5.0, Some(20.0)), band(3, 20.0, None)];
        assert_eq!(resolve_opportunity_category(&bands, 3.0), Some("band-1".into()));
        assert_eq!(resolve_opportunity_category(&bands, 10.0), Some("band-2".into()));
        assert_eq!(resolve_opportunity_category(&bands, 30.0), Some("band-3".into()));
    }

    #[test]
    fn no_band_when_none_cover_the_value() {
        let bands = vec![band(1, 5.0, Some(10.0))];
        assert_eq!(resolve_opportunity_category(&bands, 1.0), None);
    }

    #[test]
    fn falls_back_to_unbounded_band_when_value_lands_in_a_gap() {
        let bands = vec![band(1, 5.0, Some(10.0)), band(2, 20.0, None)];
        assert_eq!(resolve_opportunity_category(&bands, 1.0), Some("band-2".into()));
    }

    #[test]
    fn tie_break_uses_highest_id() {
        let bands = vec![band(1, 0.0, None), band(2, 0.0, None)];
        assert_eq!(resolve_opportunity_category(&bands, 1.0), Some("band-2".into()));
    }

    #[test]
    fn service_line_category_requires_strictly_positive_tcv() {
        let bands = vec![ServiceLineCategory {
            id: 1,
            service_line: ServiceLine::Mw,
            name: "Sub $5M".into(),
            min_tcv: 0.0,
            max_tcv: Some(5.0),
        }];
        assert_eq!(resolve_service_line_category(&bands, ServiceLine::Mw, 0.0), None);
        assert_eq!(
            resolve_service_line_category(&bands, ServiceLine::Mw, 3.0),
            Some("Sub $5M".into())
        );
    }
}
