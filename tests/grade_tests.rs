mod common;

use common::{
    KeyedBackend, PHOTOSYNTHESIS_IDEAL, PHOTOSYNTHESIS_PARTIAL, PHOTOSYNTHESIS_QUESTION,
    ScriptedBackend, Step, WELL_FORMED_REPLY, fast_config,
};
use grademark::{
    BackendAdapter, CriterionStatus, Grader, GradingError, GradingRequest, RawDocument,
    SourceFormat, Submission,
    backend::BackendFailure,
};

fn request(submission: impl Into<Submission>) -> GradingRequest {
    GradingRequest::builder()
        .question(PHOTOSYNTHESIS_QUESTION)
        .ideal_answer(PHOTOSYNTHESIS_IDEAL)
        .submission(submission)
        .build()
}

fn grader(steps: impl IntoIterator<Item = Step>) -> Grader<ScriptedBackend> {
    Grader::new(ScriptedBackend::new(steps), fast_config())
}

#[tokio::test]
async fn partial_answer_is_graded_end_to_end() {
    let grader = grader([Step::Reply(WELL_FORMED_REPLY.into())]);
    let result = grader
        .grade(&request(PHOTOSYNTHESIS_PARTIAL))
        .await
        .expect("graded");

    assert_eq!(result.overall_score(), 6.0);
    assert_eq!(result.per_criterion().len(), 4);
    assert!(!result.reasoning_summary().is_empty());

    let prompts = grader.backend().service().prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(PHOTOSYNTHESIS_PARTIAL));
}

#[tokio::test]
async fn document_submissions_are_extracted_first() {
    let grader = grader([Step::Reply(WELL_FORMED_REPLY.into())]);
    let doc = RawDocument::new(SourceFormat::PlainText, PHOTOSYNTHESIS_PARTIAL.as_bytes());

    grader.grade(&request(doc)).await.expect("graded");
    assert!(grader.backend().service().prompts()[0].contains(PHOTOSYNTHESIS_PARTIAL));
}

#[tokio::test]
async fn timeouts_are_retried_once_then_reported() {
    let grader = grader([Step::Hang, Step::Hang]);
    let outcome = grader.grade(&request(PHOTOSYNTHESIS_PARTIAL)).await;

    assert!(matches!(outcome, Err(GradingError::BackendTimeout)));
    assert_eq!(grader.backend().service().calls(), 2);
}

#[tokio::test]
async fn transient_failure_then_success_recovers() {
    let grader = grader([
        Step::Fail(BackendFailure::Transient("connection reset".into())),
        Step::Reply(WELL_FORMED_REPLY.into()),
    ]);

    let result = grader
        .grade(&request(PHOTOSYNTHESIS_PARTIAL))
        .await
        .expect("second attempt succeeds");
    assert_eq!(result.overall_score(), 6.0);
    assert_eq!(grader.backend().service().calls(), 2);
}

#[tokio::test]
async fn repeated_transient_failures_are_unavailable() {
    let grader = grader([
        Step::Fail(BackendFailure::Transient("overloaded".into())),
        Step::Fail(BackendFailure::Transient("overloaded".into())),
        Step::Reply(WELL_FORMED_REPLY.into()),
    ]);

    match grader.grade(&request(PHOTOSYNTHESIS_PARTIAL)).await {
        Err(GradingError::BackendUnavailable(cause)) => assert!(cause.contains("overloaded")),
        other => panic!("expected BackendUnavailable, got {other:?}"),
    }
    assert_eq!(grader.backend().service().calls(), 2);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let grader = grader([
        Step::Fail(BackendFailure::Permanent("invalid api key".into())),
        Step::Reply(WELL_FORMED_REPLY.into()),
    ]);

    assert!(matches!(
        grader.grade(&request(PHOTOSYNTHESIS_PARTIAL)).await,
        Err(GradingError::BackendUnavailable(_))
    ));
    assert_eq!(grader.backend().service().calls(), 1);
}

#[tokio::test]
async fn empty_submission_never_reaches_the_backend() {
    let grader = grader([Step::Reply(WELL_FORMED_REPLY.into())]);

    match grader.grade(&request(" \n\t ")).await {
        Err(GradingError::ValidationFailure { field, .. }) => {
            assert_eq!(field, "student_submission")
        }
        other => panic!("expected ValidationFailure, got {other:?}"),
    }
    assert_eq!(grader.backend().service().calls(), 0);
}

#[tokio::test]
async fn unreadable_document_never_reaches_the_backend() {
    let grader = grader([Step::Reply(WELL_FORMED_REPLY.into())]);
    let doc = RawDocument::new(SourceFormat::Pdf, b"%PDF-garbage".to_vec());

    assert!(matches!(
        grader.grade(&request(doc)).await,
        Err(GradingError::ExtractionFailure { .. })
    ));
    assert_eq!(grader.backend().service().calls(), 0);
}

#[tokio::test]
async fn malformed_reply_keeps_the_raw_text() {
    let reply = "I would give this a solid seven.";
    let grader = grader([Step::Reply(reply.into())]);

    let err = grader
        .grade(&request(PHOTOSYNTHESIS_PARTIAL))
        .await
        .expect_err("no score line");
    assert_eq!(err.raw_text(), Some(reply));
}

#[tokio::test]
async fn empty_reply_is_malformed_not_retried() {
    let grader = grader([Step::Reply(String::new()), Step::Reply(WELL_FORMED_REPLY.into())]);

    assert!(matches!(
        grader.grade(&request(PHOTOSYNTHESIS_PARTIAL)).await,
        Err(GradingError::MalformedResponse { .. })
    ));
    assert_eq!(grader.backend().service().calls(), 1);
}

#[tokio::test]
async fn thin_submissions_are_still_graded() {
    let grader = grader([Step::Reply("SCORE: 1\nREASONING: Too short.".into())]);
    let result = grader.grade(&request("ok")).await.expect("graded");

    assert_eq!(result.overall_score(), 1.0);
    assert!(
        result
            .per_criterion()
            .iter()
            .all(|c| c.status() == CriterionStatus::Unscored)
    );
}

#[tokio::test]
async fn batch_results_keep_request_order() {
    let grader = Grader::new(
        KeyedBackend::new([
            ("alpha submission", "SCORE: 9\nREASONING: Excellent."),
            ("bravo submission", "SCORE: 4\nREASONING: Weak."),
            ("charlie submission", "no score at all"),
        ]),
        fast_config(),
    );
    let requests = [
        request("This is the alpha submission about sunlight."),
        request("   "),
        request("This is the bravo submission about leaves."),
        request("This is the charlie submission about roots."),
    ];

    let outcomes = grader.grade_batch(&requests, 3).await;
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0].as_ref().expect("alpha").overall_score(), 9.0);
    assert!(matches!(outcomes[1], Err(GradingError::ValidationFailure { .. })));
    assert_eq!(outcomes[2].as_ref().expect("bravo").overall_score(), 4.0);
    assert!(matches!(outcomes[3], Err(GradingError::MalformedResponse { .. })));
}

#[tokio::test]
async fn ping_uses_a_single_attempt() {
    let adapter = BackendAdapter::new(
        ScriptedBackend::new([
            Step::Fail(BackendFailure::Transient("down".into())),
            Step::Reply("hi".into()),
        ]),
        fast_config(),
    );
    assert!(matches!(adapter.ping().await, Err(GradingError::BackendUnavailable(_))));
    assert_eq!(adapter.service().calls(), 1);

    assert!(adapter.ping().await.is_ok());
}
