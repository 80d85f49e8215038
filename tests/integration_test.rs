use parking_lot::Mutex;
use squall::ast::expr::{SortOption, UnresolvedExpr};
use squall::ast::plan::UnresolvedPlan;
use squall::data::types::ExprType;
use squall::data::value::ExprValue;
use squall::data::BindingTuple;
use squall::engine::{
    DirectScheduler, ExecutionEngine, ExplainListener, MemoryMonitor, QueryResponse,
    ResponseListener, TokioScheduler,
};
use squall::error::QueryError;
use squall::executor::ExplainNode;
use squall::expression::scalar::default_registry;
use squall::service::QueryService;
use squall::storage::memory::{MemStorageEngine, MemTable};
use std::sync::Arc;

fn people_rows(ages: &[i32]) -> Vec<BindingTuple> {
    ages.iter()
        .map(|age| BindingTuple::new(vec![("age".to_string(), ExprValue::Integer(*age))]))
        .collect()
}

fn city_age_rows(pairs: &[(&str, i32)]) -> Vec<BindingTuple> {
    pairs
        .iter()
        .map(|(city, age)| {
            BindingTuple::new(vec![
                ("city".to_string(), ExprValue::string(*city)),
                ("age".to_string(), ExprValue::Integer(*age)),
            ])
        })
        .collect()
}

fn service_over(rows: Vec<BindingTuple>, fields: &[(&str, ExprType)]) -> QueryService {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut storage = MemStorageEngine::new();
    storage.add_table(
        "people",
        MemTable::new(
            fields.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
            rows,
        ),
    );
    let engine = ExecutionEngine::new(
        Arc::new(DirectScheduler),
        Arc::new(MemoryMonitor::new(usize::MAX)),
    );
    QueryService::new(Arc::new(storage), default_registry(), engine)
}

#[derive(Default)]
struct Outcome {
    responses: Vec<QueryResponse>,
    failures: Vec<QueryError>,
}

struct Recorder(Arc<Mutex<Outcome>>);

impl ResponseListener for Recorder {
    fn on_response(&mut self, response: QueryResponse) {
        self.0.lock().responses.push(response);
    }

    fn on_failure(&mut self, error: QueryError) {
        self.0.lock().failures.push(error);
    }
}

fn run(service: &QueryService, query: &UnresolvedPlan) -> QueryResponse {
    let outcome = Arc::new(Mutex::new(Outcome::default()));
    service
        .execute(query, Box::new(Recorder(outcome.clone())))
        .unwrap();
    let mut outcome = outcome.lock();
    assert!(outcome.failures.is_empty(), "query failed unexpectedly");
    assert_eq!(outcome.responses.len(), 1, "listener must fire exactly once");
    outcome.responses.pop().unwrap()
}

#[test]
fn test_filter_projection_end_to_end() {
    let service = service_over(people_rows(&[1, 2]), &[("age", ExprType::Integer)]);
    let query = UnresolvedPlan::relation("people")
        .filter(UnresolvedExpr::attr("age").eq(UnresolvedExpr::literal(ExprValue::Integer(1))))
        .project(vec![UnresolvedExpr::attr("age")]);

    let response = run(&service, &query);
    assert_eq!(response.rows.len(), 1);
    assert!(response.rows[0].resolve("age").equal(&ExprValue::Integer(1)));
    assert_eq!(response.schema.len(), 1);
    assert_eq!(response.schema[0].name, "age");
}

#[test]
fn test_sort_and_limit_end_to_end() {
    let service = service_over(people_rows(&[5, 3, 9, 1]), &[("age", ExprType::Integer)]);
    let query = UnresolvedPlan::relation("people")
        .sort(vec![(UnresolvedExpr::attr("age"), SortOption::desc())])
        .limit(2, 0);

    let response = run(&service, &query);
    assert_eq!(response.rows.len(), 2);
    assert!(response.rows[0].resolve("age").equal(&ExprValue::Integer(9)));
    assert!(response.rows[1].resolve("age").equal(&ExprValue::Integer(5)));
}

#[test]
fn test_grouped_aggregation_end_to_end() {
    let service = service_over(
        city_age_rows(&[("a", 10), ("b", 30), ("a", 20)]),
        &[("city", ExprType::String), ("age", ExprType::Integer)],
    );
    let query = UnresolvedPlan::relation("people").aggregate(
        vec![UnresolvedExpr::alias(
            "total",
            UnresolvedExpr::aggregate("sum", UnresolvedExpr::attr("age")),
        )],
        vec![UnresolvedExpr::attr("city")],
    );

    let response = run(&service, &query);
    assert_eq!(response.rows.len(), 2);
    assert!(response.rows[0].resolve("city").equal(&ExprValue::string("a")));
    assert!(response.rows[0].resolve("total").equal(&ExprValue::Long(30)));
    assert!(response.rows[1].resolve("city").equal(&ExprValue::string("b")));
    assert!(response.rows[1].resolve("total").equal(&ExprValue::Long(30)));
}

#[test]
fn test_span_bucketing_end_to_end() {
    let service = service_over(people_rows(&[12, 17, 25]), &[("age", ExprType::Integer)]);
    let query = UnresolvedPlan::relation("people").aggregate(
        vec![UnresolvedExpr::alias("n", UnresolvedExpr::count_star())],
        vec![UnresolvedExpr::alias(
            "bucket",
            UnresolvedExpr::span(
                UnresolvedExpr::attr("age"),
                ExprValue::Integer(10),
                squall::expression::expr::SpanUnit::None,
            ),
        )],
    );

    let response = run(&service, &query);
    assert_eq!(response.rows.len(), 2);
    assert!(response.rows[0].resolve("bucket").equal(&ExprValue::Long(10)));
    assert!(response.rows[0].resolve("n").equal(&ExprValue::Integer(2)));
    assert!(response.rows[1].resolve("bucket").equal(&ExprValue::Long(20)));
    assert!(response.rows[1].resolve("n").equal(&ExprValue::Integer(1)));
}

fn ranking_query(function: &str) -> UnresolvedPlan {
    UnresolvedPlan::relation("people").window(vec![UnresolvedExpr::alias(
        "w",
        UnresolvedExpr::function(function, vec![]).over(
            vec![UnresolvedExpr::attr("city")],
            vec![(UnresolvedExpr::attr("age"), SortOption::asc())],
        ),
    )])
}

fn window_column(pairs: &[(&str, i32)], function: &str) -> Vec<ExprValue> {
    let service = service_over(
        city_age_rows(pairs),
        &[("city", ExprType::String), ("age", ExprType::Integer)],
    );
    let response = run(&service, &ranking_query(function));
    response.rows.iter().map(|r| r.resolve("w")).collect()
}

#[test]
fn test_ranking_functions_over_ties() {
    // One partition with sort keys (1, 1, 2).
    let rows = [("a", 1), ("a", 1), ("a", 2)];

    let row_number = window_column(&rows, "row_number");
    assert!(row_number[0].equal(&ExprValue::Integer(1)));
    assert!(row_number[1].equal(&ExprValue::Integer(2)));
    assert!(row_number[2].equal(&ExprValue::Integer(3)));

    let rank = window_column(&rows, "rank");
    assert!(rank[0].equal(&ExprValue::Integer(1)));
    assert!(rank[1].equal(&ExprValue::Integer(1)));
    assert!(rank[2].equal(&ExprValue::Integer(3)));

    let dense_rank = window_column(&rows, "dense_rank");
    assert!(dense_rank[0].equal(&ExprValue::Integer(1)));
    assert!(dense_rank[1].equal(&ExprValue::Integer(1)));
    assert!(dense_rank[2].equal(&ExprValue::Integer(2)));
}

#[test]
fn test_windowed_sum_resets_at_partition_boundary() {
    let service = service_over(
        city_age_rows(&[("a", 10), ("b", 30), ("a", 20)]),
        &[("city", ExprType::String), ("age", ExprType::Integer)],
    );
    let query = UnresolvedPlan::relation("people").window(vec![UnresolvedExpr::alias(
        "running",
        UnresolvedExpr::aggregate("sum", UnresolvedExpr::attr("age")).over(
            vec![UnresolvedExpr::attr("city")],
            vec![(UnresolvedExpr::attr("age"), SortOption::asc())],
        ),
    )]);

    let response = run(&service, &query);
    // Rows come back sorted by partition then age: a/10, a/20, b/30.
    assert_eq!(response.rows.len(), 3);
    assert!(response.rows[0].resolve("running").equal(&ExprValue::Long(10)));
    assert!(response.rows[1].resolve("running").equal(&ExprValue::Long(30)));
    assert!(response.rows[2].resolve("running").equal(&ExprValue::Long(30)));
}

#[test]
fn test_dedupe_and_eval_end_to_end() {
    let service = service_over(people_rows(&[1, 1, 2]), &[("age", ExprType::Integer)]);
    let query = UnresolvedPlan::relation("people")
        .dedupe(vec![UnresolvedExpr::attr("age")])
        .eval(vec![UnresolvedExpr::alias(
            "next",
            UnresolvedExpr::function(
                "+",
                vec![
                    UnresolvedExpr::attr("age"),
                    UnresolvedExpr::literal(ExprValue::Integer(1)),
                ],
            ),
        )]);

    let response = run(&service, &query);
    assert_eq!(response.rows.len(), 2);
    assert!(response.rows[0].resolve("next").equal(&ExprValue::Integer(2)));
    assert!(response.rows[1].resolve("next").equal(&ExprValue::Integer(3)));
}

#[test]
fn test_semantic_error_is_synchronous() {
    let service = service_over(people_rows(&[1]), &[("age", ExprType::Integer)]);
    let outcome = Arc::new(Mutex::new(Outcome::default()));
    let query = UnresolvedPlan::relation("people")
        .filter(UnresolvedExpr::attr("salary").eq(UnresolvedExpr::literal(ExprValue::Integer(1))));

    let err = service
        .execute(&query, Box::new(Recorder(outcome.clone())))
        .unwrap_err();
    assert!(err.to_string().contains("can't resolve symbol field [salary]"));
    let outcome = outcome.lock();
    assert!(outcome.responses.is_empty());
    assert!(outcome.failures.is_empty());
}

struct ExplainRecorder(Arc<Mutex<Vec<ExplainNode>>>);

impl ExplainListener for ExplainRecorder {
    fn on_explain(&mut self, tree: ExplainNode) {
        self.0.lock().push(tree);
    }

    fn on_failure(&mut self, error: QueryError) {
        panic!("explain failed: {}", error);
    }
}

#[test]
fn test_explain_shows_pushdown_scan() {
    let service = service_over(people_rows(&[1, 2]), &[("age", ExprType::Integer)]);
    let trees = Arc::new(Mutex::new(Vec::new()));
    let query = UnresolvedPlan::relation("people")
        .filter(UnresolvedExpr::attr("age").eq(UnresolvedExpr::literal(ExprValue::Integer(1))))
        .project(vec![UnresolvedExpr::attr("age")]);

    service
        .explain(&query, Box::new(ExplainRecorder(trees.clone())))
        .unwrap();

    let trees = trees.lock();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].name, "ProjectOperator");
    // The filter was pushed into the scan, so the project's child is the
    // scan itself.
    assert_eq!(trees[0].children[0].name, "MemScanOperator");
    assert!(trees[0].children[0].description.contains("filter="));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_execution_delivers_exactly_once() {
    let mut storage = MemStorageEngine::new();
    storage.add_table(
        "people",
        MemTable::new(
            [("age".to_string(), ExprType::Integer)].into_iter().collect(),
            people_rows(&[1, 2, 3]),
        ),
    );
    let engine = ExecutionEngine::new(
        Arc::new(TokioScheduler::current()),
        Arc::new(MemoryMonitor::new(usize::MAX)),
    );
    let service = QueryService::new(Arc::new(storage), default_registry(), engine);

    struct ChannelListener {
        tx: Option<tokio::sync::oneshot::Sender<QueryResponse>>,
    }

    impl ResponseListener for ChannelListener {
        fn on_response(&mut self, response: QueryResponse) {
            if let Some(tx) = self.tx.take() {
                let _ = tx.send(response);
            }
        }

        fn on_failure(&mut self, error: QueryError) {
            panic!("unexpected failure: {}", error);
        }
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    let query = UnresolvedPlan::relation("people");
    service
        .execute(&query, Box::new(ChannelListener { tx: Some(tx) }))
        .unwrap();

    let response = rx.await.expect("listener must deliver exactly once");
    assert_eq!(response.rows.len(), 3);
}
