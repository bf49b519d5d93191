//! Folding several document profiles into one.

use super::profile::{DocumentKind, StructuredTaxProfile};

/// Merge `secondary` into a copy of `primary`.
///
/// - salary: taken wholesale from `secondary` when `primary` has no §17(1) figure
/// - other income: every bucket adds
/// - deductions: section-wise maximum, total recomputed
/// - credits: TDS on salary only fills a gap; TDS other, advance and
///   self-assessment tax add; TCS and refunds take the maximum
///
/// A secondary sharing any source with `primary` is refused and `primary`
/// returned unchanged, so additive fields are never counted twice.
pub fn reconcile(
    primary: &StructuredTaxProfile,
    secondary: &StructuredTaxProfile,
) -> StructuredTaxProfile {
    let mut sources = primary.provenance();
    let incoming = secondary.provenance();
    if !incoming.is_disjoint(&sources) {
        if incoming.is_subset(&sources) {
            log::warn!(
                "skipping reconcile: {} source(s) already merged into this profile",
                incoming.len()
            );
        } else {
            let shared = incoming.intersection(&sources).count();
            log::warn!(
                "refusing reconcile: {shared} of {} incoming source(s) already merged",
                incoming.len()
            );
        }
        return primary.clone();
    }
    sources.extend(incoming);

    let mut merged = primary.clone();
    merged.identity.fill_missing(&secondary.identity);

    if !primary.salary.has_gross() && secondary.salary.has_gross() {
        log::debug!("salary block taken from {:?}", secondary.identity.doc_type);
        merged.salary = secondary.salary.clone();
    }

    merged.other_income.add(&secondary.other_income);
    merged.deductions = primary.deductions.max_merge(&secondary.deductions);

    let (mine, theirs) = (&mut merged.credits, &secondary.credits);
    if mine.tds_salary_192.is_zero() {
        mine.tds_salary_192 = theirs.tds_salary_192;
    }
    mine.tds_other += theirs.tds_other;
    mine.adv_tax += theirs.adv_tax;
    mine.self_assessment_tax += theirs.self_assessment_tax;
    mine.tcs_total = mine.tcs_total.max(theirs.tcs_total);
    mine.refund_issued = mine.refund_issued.max(theirs.refund_issued);

    merged.merged_sources = sources;
    merged
}

/// Fold profiles left to right. An incoming Form 16 takes over as primary;
/// otherwise whichever profile came first stays primary.
pub fn fuse_profiles<I>(profiles: I) -> Option<StructuredTaxProfile>
where
    I: IntoIterator<Item = StructuredTaxProfile>,
{
    profiles.into_iter().reduce(|fused, next| {
        if next.identity.kind() == DocumentKind::Form16 {
            log::debug!("Form 16 becomes primary");
            reconcile(&next, &fused)
        } else {
            reconcile(&fused, &next)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::tests::{form16, profile};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn ais() -> StructuredTaxProfile {
        let mut p = profile("AIS");
        p.deductions.sec_80c = dec!(15000);
        p.deductions.sec_80tta = dec!(3000);
        p.deductions.recompute_total();
        p.other_income.savings_interest = dec!(3000);
        p.other_income.fd_interest = dec!(12000);
        p.credits.tds_salary_192 = dec!(99999);
        p.credits.tds_other = dec!(1200);
        p.credits.tcs_total = dec!(500);
        p
    }

    fn employer_form16() -> StructuredTaxProfile {
        let mut p = form16(dec!(1200000), dec!(50000));
        p.identity.employee_pan = Some("ABCDE1234F".to_string());
        p.deductions.sec_80c = Decimal::ZERO;
        p.deductions.sec_80d = dec!(25000);
        p.deductions.recompute_total();
        p.other_income.savings_interest = dec!(1000);
        p.credits.tds_salary_192 = dec!(110000);
        p.credits.tcs_total = dec!(300);
        p
    }

    #[test]
    fn deduction_sections_take_max() {
        let merged = reconcile(&employer_form16(), &ais());
        assert_eq!(merged.deductions.sec_80c, dec!(15000));
        assert_eq!(merged.deductions.sec_80d, dec!(25000));
        // 15000 + 25000 + 3000
        assert_eq!(merged.deductions.total, dec!(43000));
        assert_eq!(merged.deductions.total, merged.deductions.sections_total());
    }

    #[test]
    fn other_income_adds() {
        let merged = reconcile(&employer_form16(), &ais());
        assert_eq!(merged.other_income.savings_interest, dec!(4000));
        assert_eq!(merged.other_income.fd_interest, dec!(12000));
    }

    #[test]
    fn credits_follow_field_rules() {
        let mut primary = employer_form16();
        primary.credits.adv_tax = dec!(20000);
        primary.credits.self_assessment_tax = dec!(4000);
        primary.credits.refund_issued = dec!(1500);
        let mut secondary = ais();
        secondary.credits.adv_tax = dec!(5000);
        secondary.credits.self_assessment_tax = dec!(1000);
        secondary.credits.refund_issued = dec!(900);

        let merged = reconcile(&primary, &secondary);
        // Form 16 figure is authoritative
        assert_eq!(merged.credits.tds_salary_192, dec!(110000));
        assert_eq!(merged.credits.tds_other, dec!(1200));
        assert_eq!(merged.credits.adv_tax, dec!(25000));
        assert_eq!(merged.credits.self_assessment_tax, dec!(5000));
        assert_eq!(merged.credits.tcs_total, dec!(500));
        assert_eq!(merged.credits.refund_issued, dec!(1500));

        // the larger refund reading wins from either side
        secondary.credits.refund_issued = dec!(2500);
        assert_eq!(reconcile(&primary, &secondary).credits.refund_issued, dec!(2500));

        // TDS on salary fills a gap
        let mut bare = employer_form16();
        bare.credits.tds_salary_192 = Decimal::ZERO;
        assert_eq!(reconcile(&bare, &ais()).credits.tds_salary_192, dec!(99999));
    }

    #[test]
    fn salary_block_taken_wholesale() {
        let mut primary = ais();
        primary.salary.exempt_allowances_sec10.insert("HRA".to_string(), dec!(60000));
        let merged = reconcile(&primary, &employer_form16());
        assert_eq!(merged.salary, employer_form16().salary);
        assert!(merged.salary.exempt_allowances_sec10.is_empty());

        // a primary with a gross figure keeps its own block
        let merged = reconcile(&employer_form16(), &ais());
        assert_eq!(merged.salary, employer_form16().salary);
    }

    #[test]
    fn inputs_are_untouched() {
        let primary = employer_form16();
        let secondary = ais();
        let _ = reconcile(&primary, &secondary);
        assert_eq!(primary, employer_form16());
        assert_eq!(secondary, ais());
    }

    #[test]
    fn identity_gaps_filled() {
        let mut secondary = ais();
        secondary.identity.employee_name = Some("A Taxpayer".to_string());
        secondary.identity.employee_pan = Some("ZZZZZ9999Z".to_string());
        let merged = reconcile(&employer_form16(), &secondary);
        assert_eq!(merged.identity.employee_name.as_deref(), Some("A Taxpayer"));
        assert_eq!(merged.identity.employee_pan.as_deref(), Some("ABCDE1234F"));
        assert_eq!(merged.identity.doc_type.as_deref(), Some("Form 16"));
    }

    #[test]
    fn re_merging_same_secondary_is_a_no_op() {
        let once = reconcile(&employer_form16(), &ais());
        let twice = reconcile(&once, &ais());
        assert_eq!(twice, once);
        assert_eq!(twice.other_income.savings_interest, dec!(4000));
        assert_eq!(once.merged_sources.len(), 2);
    }

    #[test]
    fn merged_profile_is_not_merged_into_itself() {
        let once = reconcile(&employer_form16(), &ais());
        assert_eq!(reconcile(&once, &once), once);
        // a source contained in the primary is skipped too
        assert_eq!(reconcile(&once, &employer_form16()), once);
    }

    #[test]
    fn overlapping_sources_are_refused() {
        let mut statement = profile("Form 26AS");
        statement.credits.tds_other = dec!(800);
        statement.other_income.dividend = dec!(2000);

        let with_ais = reconcile(&employer_form16(), &ais());
        let ais_and_statement = reconcile(&ais(), &statement);
        assert_eq!(ais_and_statement.merged_sources.len(), 2);

        // AIS is in both, so nothing from the second profile is taken
        let merged = reconcile(&with_ais, &ais_and_statement);
        assert_eq!(merged, with_ais);
        assert_eq!(merged.other_income.savings_interest, dec!(4000));
        assert_eq!(merged.credits.tds_other, dec!(1200));
        assert_eq!(merged.other_income.dividend, Decimal::ZERO);

        // a disjoint profile still merges
        let merged = reconcile(&with_ais, &statement);
        assert_eq!(merged.credits.tds_other, dec!(2000));
        assert_eq!(merged.merged_sources.len(), 3);
    }

    #[test]
    fn fusion_puts_form16_first() {
        let fused = fuse_profiles([ais(), employer_form16()]).unwrap();
        assert_eq!(fused.identity.doc_type.as_deref(), Some("Form 16"));
        assert_eq!(fused.credits.tds_salary_192, dec!(110000));
        assert_eq!(fused.deductions.total, dec!(43000));

        let reversed = fuse_profiles([employer_form16(), ais()]).unwrap();
        assert_eq!(reversed.identity, fused.identity);
        assert_eq!(reversed.deductions, fused.deductions);
        assert_eq!(reversed.credits, fused.credits);
    }

    #[test]
    fn fusion_of_non_form16_keeps_first_seen() {
        let mut statement = profile("Form 26AS");
        statement.credits.tds_salary_192 = dec!(5000);
        let fused = fuse_profiles([statement, ais()]).unwrap();
        assert_eq!(fused.identity.doc_type.as_deref(), Some("Form 26AS"));
        assert_eq!(fused.credits.tds_salary_192, dec!(5000));
    }

    #[test]
    fn fusion_of_nothing() {
        assert!(fuse_profiles(Vec::<StructuredTaxProfile>::new()).is_none());
        let single = fuse_profiles([ais()]).unwrap();
        assert_eq!(single, ais());
    }
}
