use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tripvar_core::{parse_date_field, JsonOutputParser, ResponseExtractor, Runnable, TripvarError};

fn travel_extractor() -> ResponseExtractor {
    ResponseExtractor::new(["overview", "highlights", "daily_plans"])
}

#[test]
fn extracts_single_fenced_block_surrounded_by_prose() {
    let text = "Sure!\n```json\n{\"overview\":\"...\",\"highlights\":[\"x\"],\"daily_plans\":[{\"day\":1}]}\n```\nEnjoy your trip.";

    let object = travel_extractor().extract(text).unwrap();
    assert_eq!(object["highlights"], json!(["x"]));
    assert_eq!(object["daily_plans"][0]["day"], json!(1));
}

#[test]
fn first_complete_block_wins_over_earlier_incomplete_one() {
    let text = concat!(
        "Here is a draft:\n",
        "```json\n{\"overview\":\"draft\",\"highlights\":[\"a\"]}\n```\n",
        "And the final version:\n",
        "```json\n{\"overview\":\"final\",\"highlights\":[\"b\"],\"daily_plans\":[]}\n```\n"
    );

    let object = travel_extractor().extract(text).unwrap();
    assert_eq!(object["overview"], json!("final"));
}

#[test]
fn later_complete_blocks_are_not_considered() {
    let text = concat!(
        "```{\"overview\":\"one\",\"highlights\":[],\"daily_plans\":[]}```",
        "```{\"overview\":\"two\",\"highlights\":[],\"daily_plans\":[]}```"
    );

    let object = travel_extractor().extract(text).unwrap();
    assert_eq!(object["overview"], json!("one"));
}

#[test]
fn malformed_block_is_skipped() {
    let text = concat!(
        "```json\n{\"overview\": \"broken\", \"highlights\": [}\n```\n",
        "```json\n{\"overview\":\"ok\",\"highlights\":[\"x\"],\"daily_plans\":[]}\n```"
    );

    let object = travel_extractor().extract(text).unwrap();
    assert_eq!(object["overview"], json!("ok"));
}

#[test]
fn unfenced_json_with_prose_is_accepted() {
    let text = "The plan: {\"overview\":\"o\",\"highlights\":[],\"daily_plans\":[]} -- done";
    let object = travel_extractor().extract(text).unwrap();
    assert_eq!(object["overview"], json!("o"));
}

// "Solution" is a denoising rule for one model's scratch blocks, not a JSON
// detection rule. A block carrying the word is dropped even if it is valid.
#[test]
fn block_with_solution_marker_is_discarded() {
    let text = concat!(
        "```\nSolution: {\"overview\":\"scratch\",\"highlights\":[],\"daily_plans\":[]}\n```\n",
        "```json\n{\"overview\":\"real\",\"highlights\":[],\"daily_plans\":[]}\n```"
    );

    let object = travel_extractor().extract(text).unwrap();
    assert_eq!(object["overview"], json!("real"));
}

#[test]
fn solution_marker_can_drop_the_only_answer() {
    let text = "```json\n{\"overview\":\"Solution-focused trip\",\"highlights\":[],\"daily_plans\":[]}\n```";

    let err = travel_extractor().extract(text).unwrap_err();
    assert!(matches!(err, TripvarError::Extraction { .. }));
}

#[test]
fn failure_carries_raw_text_and_last_parse_error() {
    let text = "```json\n{\"overview\": }\n```";

    match travel_extractor().extract(text).unwrap_err() {
        TripvarError::Extraction {
            raw,
            last_parse_error,
            ..
        } => {
            assert_eq!(raw, text);
            assert!(last_parse_error.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn text_without_braces_fails() {
    let err = travel_extractor()
        .extract("I cannot help with that.")
        .unwrap_err();
    match err {
        TripvarError::Extraction {
            last_parse_error, ..
        } => assert!(last_parse_error.is_none()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn parse_date_field_accepts_iso_dates() {
    let date = parse_date_field("daily_plans[0].date", &json!("2024-06-01")).unwrap();
    assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
}

#[test]
fn parse_date_field_names_the_field() {
    for bad in [json!("06/01/2024"), json!("2024-6-1"), json!(20240601), json!("2024-02-30")] {
        let err = parse_date_field("daily_plans[2].date", &bad).unwrap_err();
        match err {
            TripvarError::Extraction { reason, .. } => {
                assert!(reason.contains("daily_plans[2].date"), "{reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct Answer {
    answer: String,
    confidence: f32,
}

#[tokio::test]
async fn json_output_parser_converts_to_typed_value() {
    let parser = JsonOutputParser::<Answer>::new(ResponseExtractor::new(["answer"]));

    let output = parser
        .invoke("```json\n{\"answer\":\"Paris\",\"confidence\":0.9}\n```".to_string())
        .await
        .unwrap();
    assert_eq!(
        output,
        Answer {
            answer: "Paris".to_string(),
            confidence: 0.9,
        }
    );
}

#[tokio::test]
async fn json_output_parser_reports_shape_mismatch_as_extraction_error() {
    let parser = JsonOutputParser::<Answer>::new(ResponseExtractor::new(["answer"]));

    let err = parser
        .invoke("{\"answer\":\"Paris\",\"confidence\":\"high\"}".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, TripvarError::Extraction { .. }));
}

#[test]
fn extract_as_types_the_first_complete_block() {
    let extractor = ResponseExtractor::new(["answer", "confidence"]);
    let text = "Draft:\n```json\n{\"answer\":\"Rome\"}\n```\nFinal:\n```json\n{\"answer\":\"Paris\",\"confidence\":0.5}\n```";

    let answer: Answer = extractor.extract_as(text).unwrap();
    assert_eq!(answer.answer, "Paris");
    assert_eq!(answer.confidence, 0.5);
}

#[test]
fn extract_as_keeps_raw_text_when_shape_is_wrong() {
    let extractor = ResponseExtractor::new(["answer"]);
    let text = "{\"answer\": 42, \"confidence\": 1.0}";

    match extractor.extract_as::<Answer>(text).unwrap_err() {
        TripvarError::Extraction {
            raw,
            last_parse_error,
            ..
        } => {
            assert_eq!(raw, text);
            assert!(last_parse_error.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
