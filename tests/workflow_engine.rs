mod common;

use common::*;
use nl2sql::execution_loop::{
    QueryRequest, WorkflowError, EXPLANATION_UNAVAILABLE_MESSAGE, NO_DATA_MESSAGE,
};
use nl2sql::error::Result;
use nl2sql::llm::{ChatModel, ChatTurn, ProviderRegistry, ProviderSpec, Role};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_end_to_end_select_all() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT * FROM t", "The table has two rows, a and b.");
    let engine = engine(model.clone(), 3);

    let outcome = engine
        .run(QueryRequest::new("show all rows in table t", &db))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 1);
    let result = outcome.result().unwrap();
    assert_eq!(result.columns, vec!["id", "name"]);
    assert_eq!(
        serde_json::to_value(&result.rows).unwrap(),
        json!([{"id": 1, "name": "a"}, {"id": 2, "name": "b"}])
    );
    assert_eq!(result.message.as_deref(), Some("The table has two rows, a and b."));
    assert_eq!(model.explanation_calls(), 1);
    assert_eq!(outcome.status_code(), 200);
}

#[tokio::test]
async fn test_always_invalid_sql_exhausts_budget() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT * FROM no_such_table", "unused");
    let engine = engine(model.clone(), 3);

    let outcome = engine.run(QueryRequest::new("q", &db)).await.unwrap();

    assert_eq!(outcome.attempts(), 4);
    assert_eq!(model.generation_calls().len(), 4);
    assert_eq!(model.explanation_calls(), 0);
    match outcome.error().unwrap() {
        WorkflowError::RetriesExhausted { attempts, last } => {
            assert_eq!(*attempts, 4);
            assert!(last.to_string().contains("no such table"));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(outcome.status_code(), 400);
}

#[tokio::test]
async fn test_zero_retry_budget_generates_once() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT nope FROM t", "unused");
    let engine = engine(model.clone(), 0);

    let outcome = engine.run(QueryRequest::new("q", &db)).await.unwrap();

    assert_eq!(outcome.attempts(), 1);
    assert_eq!(model.calls().len(), 1);
    assert!(matches!(
        outcome.error(),
        Some(WorkflowError::RetriesExhausted { .. })
    ));
}

#[tokio::test]
async fn test_non_select_stops_on_first_attempt() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("DROP TABLE t", "unused");
    let engine = engine(model.clone(), 3);

    let outcome = engine.run(QueryRequest::new("delete everything", &db)).await.unwrap();

    assert_eq!(outcome.attempts(), 1);
    assert_eq!(model.calls().len(), 1);
    assert!(matches!(
        outcome.error(),
        Some(WorkflowError::SecurityViolation(_))
    ));
    assert_eq!(outcome.status_code(), 403);
    assert!(outcome.to_response()["error"]
        .as_str()
        .unwrap()
        .contains("Security Violation"));
    assert_eq!(row_count(&db, "t"), 2);
}

#[tokio::test]
async fn test_previous_error_is_fed_back() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::with(|index, messages| {
        if is_explanation(messages) {
            return Ok("Two names.".to_string());
        }
        match index {
            0 => Ok("SELECT nme FROM t".to_string()),
            _ => Ok("SELECT name FROM t".to_string()),
        }
    });
    let engine = engine(model.clone(), 3);

    let outcome = engine.run(QueryRequest::new("list names", &db)).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 2);
    let generations = model.generation_calls();
    assert!(!system_prompt(&generations[0]).contains("PREVIOUS ERROR"));
    assert!(system_prompt(&generations[1]).contains("PREVIOUS ERROR: no such column: nme"));
    assert!(system_prompt(&generations[1]).contains("CORRECTION: Please fix the SQL query"));
}

#[tokio::test]
async fn test_generation_failure_consumes_a_retry() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::with(|index, messages| {
        if is_explanation(messages) {
            return Ok("ok".to_string());
        }
        if index == 0 {
            Err(llm_failure("openai API error (503): overloaded"))
        } else {
            Ok("SELECT id FROM t".to_string())
        }
    });
    let engine = engine(model.clone(), 3);

    let outcome = engine.run(QueryRequest::new("ids", &db)).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 2);
    let generations = model.generation_calls();
    assert!(system_prompt(&generations[1]).contains("PREVIOUS ERROR: Generation Error"));
}

#[tokio::test]
async fn test_persistent_generation_failure_exhausts_budget() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::with(|_, _| Err(llm_failure("quota exceeded")));
    let engine = engine(model.clone(), 2);

    let outcome = engine.run(QueryRequest::new("q", &db)).await.unwrap();

    assert_eq!(outcome.attempts(), 3);
    assert_eq!(model.calls().len(), 3);
    match outcome.error().unwrap() {
        WorkflowError::RetriesExhausted { last, .. } => {
            assert!(matches!(**last, WorkflowError::Generation(_)))
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
    assert!(outcome.sql().is_none());
}

#[tokio::test]
async fn test_empty_result_skips_explanation_call() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT * FROM t WHERE id > 100", "should not be used");
    let engine = engine(model.clone(), 3);

    let outcome = engine.run(QueryRequest::new("rows above 100", &db)).await.unwrap();

    let result = outcome.result().unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(result.columns, vec!["id", "name"]);
    assert_eq!(result.message.as_deref(), Some(NO_DATA_MESSAGE));
    assert_eq!(model.explanation_calls(), 0);
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn test_explanation_failure_keeps_rows() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::with(|_, messages| {
        if is_explanation(messages) {
            Err(llm_failure("timeout"))
        } else {
            Ok("SELECT * FROM t".to_string())
        }
    });
    let engine = engine(model.clone(), 3);

    let outcome = engine.run(QueryRequest::new("all", &db)).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 1);
    let result = outcome.result().unwrap();
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.message.as_deref(), Some(EXPLANATION_UNAVAILABLE_MESSAGE));
}

#[tokio::test]
async fn test_fenced_completion_is_cleaned_before_execution() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed(
        "Here you go:\n```sql\nSELECT name FROM t ORDER BY id DESC\n```",
        "Names in reverse.",
    );
    let engine = engine(model, 3);

    let outcome = engine.run(QueryRequest::new("names", &db)).await.unwrap();

    assert_eq!(outcome.sql(), Some("SELECT name FROM t ORDER BY id DESC"));
    assert_eq!(
        serde_json::to_value(&outcome.result().unwrap().rows).unwrap(),
        json!([{"name": "b"}, {"name": "a"}])
    );
}

#[tokio::test]
async fn test_missing_database_never_calls_model() {
    let model = ScriptedModel::fixed("SELECT 1", "unused");
    let engine = engine(model.clone(), 3);

    let outcome = engine
        .run(QueryRequest::new("q", "/no/such/dir/missing.db"))
        .await
        .unwrap();

    assert!(matches!(
        outcome.error(),
        Some(WorkflowError::SchemaUnavailable(_))
    ));
    assert_eq!(outcome.attempts(), 0);
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_unsupported_provider_fails_fast() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT 1", "unused");
    let engine = engine(model.clone(), 3);

    let request = QueryRequest::new("q", &db).with_model(Some("cohere".to_string()), None);
    let outcome = engine.run(request).await.unwrap();

    match outcome.error().unwrap() {
        WorkflowError::Configuration(msg) => assert!(msg.contains("Unsupported LLM provider")),
        other => panic!("expected Configuration, got {:?}", other),
    }
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_provider_override_builds_one_off_backend() {
    let (_dir, db) = sample_db();
    let default_model = ScriptedModel::fixed("SELECT 1", "unused");
    let override_model = ScriptedModel::named("stub-large", |_, messages| {
        if is_explanation(messages) {
            Ok("From the override.".to_string())
        } else {
            Ok("SELECT COUNT(*) AS n FROM t".to_string())
        }
    });

    let mut registry = ProviderRegistry::empty();
    let built = override_model.clone();
    registry.register(
        "stub",
        "stub-small",
        "http://localhost",
        "UNUSED",
        Arc::new(move |spec: &ProviderSpec| -> Result<Arc<dyn ChatModel>> {
            assert_eq!(spec.model_name, "stub-large");
            Ok(built.clone() as Arc<dyn ChatModel>)
        }),
    );
    let engine = engine_with_registry(default_model.clone(), registry, 3);

    let request = QueryRequest::new("how many?", &db)
        .with_model(Some("stub".to_string()), Some("stub-large".to_string()));
    let outcome = engine.run(request).await.unwrap();

    assert_eq!(outcome.result().unwrap().rows[0]["n"], json!(2));
    assert!(default_model.calls().is_empty());
    assert_eq!(override_model.calls().len(), 2);
}

#[tokio::test]
async fn test_chat_history_reaches_generation_prompt() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT name FROM t WHERE id = 1", "It is a.");
    let engine = engine(model.clone(), 3);

    let history = vec![
        ChatTurn::new("user", "show all rows in table t"),
        ChatTurn::new("assistant", "SELECT * FROM t"),
    ];
    let request = QueryRequest::new("only the first one", &db).with_history(history);
    engine.run(request).await.unwrap();

    let prompt = &model.generation_calls()[0];
    assert_eq!(prompt.len(), 4);
    assert_eq!(prompt[1].role, Role::User);
    assert_eq!(prompt[2].role, Role::Assistant);
    assert_eq!(prompt[2].content, "SELECT * FROM t");
    assert_eq!(prompt[3].content, "only the first one");
}

#[tokio::test]
async fn test_same_query_twice_is_identical() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT * FROM t ORDER BY id", "Two rows.");
    let engine = engine(model, 3);

    let first = engine.run(QueryRequest::new("all", &db)).await.unwrap();
    let second = engine.run(QueryRequest::new("all", &db)).await.unwrap();

    let first = first.result().unwrap();
    let second = second.result().unwrap();
    assert_eq!(first.columns, second.columns);
    assert_eq!(
        serde_json::to_string(&first.rows).unwrap(),
        serde_json::to_string(&second.rows).unwrap()
    );
}

#[tokio::test]
async fn test_stacked_statement_never_writes() {
    let (_dir, db) = sample_db();
    let model = ScriptedModel::fixed("SELECT 1; DROP TABLE t", "unused");
    let engine = engine(model, 1);

    engine.run(QueryRequest::new("sneaky", &db)).await.unwrap();

    assert_eq!(row_count(&db, "t"), 2);
}
