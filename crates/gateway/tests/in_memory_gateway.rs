use gateway::{Gateway, GatewayError, InMemoryAssessmentService};
use hubx_core::model::{AnswerSheet, AssessmentId, OptionId, QuestionId};

#[tokio::test]
async fn gateway_routes_both_calls_to_the_same_catalogue() {
    let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
    let gateway = Gateway::in_memory(service.clone());
    let id = AssessmentId::new("assessment-physics-midterm");

    let detail = gateway.details.get_assessment_detail(&id).await.unwrap();
    assert_eq!(detail.total_score(), 20);
    assert_eq!(detail.subjects().len(), 2);

    let mut answers = AnswerSheet::new();
    let first = &detail.questions()[0];
    answers.insert(first.id().clone(), first.options()[1].id.clone());

    let receipt = gateway
        .submissions
        .submit_assessment(&id, &answers)
        .await
        .unwrap();
    assert!(!receipt.result_id.as_str().is_empty());

    let recorded = service.submissions().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].assessment_id, id);
}

#[tokio::test]
async fn submit_for_unknown_assessment_is_a_validation_error() {
    let gateway = Gateway::in_memory(InMemoryAssessmentService::new());
    let mut answers = AnswerSheet::new();
    answers.insert(QuestionId::new("q1"), OptionId::new("a"));

    let err = gateway
        .submissions
        .submit_assessment(&AssessmentId::new("ghost"), &answers)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn catalogue_lists_sample_ids() {
    let service = InMemoryAssessmentService::with_sample_catalogue().unwrap();
    let ids = service.assessment_ids().unwrap();
    assert_eq!(
        ids,
        vec![
            AssessmentId::new("assessment-physics-midterm"),
            AssessmentId::new("practice-biology-101"),
        ]
    );
}
