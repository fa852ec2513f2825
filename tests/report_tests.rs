use grademark::{
    GradingResult, Rubric, parse,
    report::{BatchSummary, GradeDistribution, Letter, format_grade, letter_grade},
    util::{looks_thin, preview},
};

fn scored(score: f64) -> GradingResult {
    parse(&format!("SCORE: {score}\nREASONING: ok"), &Rubric::default()).expect("parse")
}

#[test]
fn letter_bands_follow_percentage_thresholds() {
    assert_eq!(letter_grade(95.0), Letter::A);
    assert_eq!(letter_grade(90.0), Letter::A);
    assert_eq!(letter_grade(89.9), Letter::B);
    assert_eq!(letter_grade(70.0), Letter::C);
    assert_eq!(letter_grade(60.0), Letter::D);
    assert_eq!(letter_grade(59.9), Letter::F);
    assert_eq!(format_grade(82.0), "B (82.0%)");
}

#[test]
fn empty_batch_has_no_summary() {
    assert!(BatchSummary::from_results(std::iter::empty()).is_none());
}

#[test]
fn single_result_summary() {
    let results = [scored(7.5)];
    let summary = BatchSummary::from_results(&results).expect("summary");

    assert_eq!(summary.total_submissions, 1);
    assert_eq!(summary.average, 75.0);
    assert_eq!(summary.median, 75.0);
    assert_eq!(summary.standard_deviation, 0.0);
    assert_eq!(summary.pass_rate, 100.0);
}

#[test]
fn batch_statistics() {
    let results = [scored(9.5), scored(5.0), scored(8.0), scored(6.5)];
    let summary = BatchSummary::from_results(&results).expect("summary");

    assert_eq!(summary.total_submissions, 4);
    assert!((summary.average - 72.5).abs() < 1e-9);
    assert_eq!(summary.median, 80.0);
    assert_eq!(summary.highest, 95.0);
    assert_eq!(summary.lowest, 50.0);
    assert!((summary.standard_deviation - 19.364916731037084).abs() < 1e-9);
    assert_eq!(summary.pass_rate, 75.0);
    assert_eq!(
        summary.distribution,
        GradeDistribution {
            a: 1,
            b: 1,
            c: 0,
            d: 1,
            f: 1,
        }
    );
}

#[test]
fn thin_text_detection() {
    assert!(looks_thin("ok"));
    assert!(looks_thin("--- *** ___ ... ### !!!"));
    assert!(!looks_thin("Plants turn light into sugar."));
}

#[test]
fn preview_truncates_at_word_boundary() {
    assert_eq!(preview("  ", 10), "No text content available");
    assert_eq!(preview("short\n text", 40), "short text");
    assert_eq!(preview("the quick brown fox jumps", 12), "the quick...");
}
