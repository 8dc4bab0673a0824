//! End-to-end validator scenarios, SQL literal in, accept/reject out.

use queryguard_policy::ColumnStrategy;
use queryguard_test::PolicyFixture;
use queryguard_validator::{PlanEntry, ValidateRequest, Validator, VerrCode};

fn validate(sql: &str, profile: &queryguard_policy::PolicyCatalogEntry) -> Result<Vec<PlanEntry>, VerrCode> {
    Validator::new().validate(ValidateRequest { profile, sql }).map_err(|e| e.code)
}

#[test]
fn accepts_plain_select_with_no_sensitive_projection() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let plan = validate("SELECT u.name FROM users u WHERE u.id = 1;", &profile).expect("should accept");
    assert_eq!(plan, vec![PlanEntry::Plaintext]);
}

#[test]
fn accepts_and_tokenizes_schema_scoped_sensitive_column() {
    let profile = PolicyFixture::new()
        .sensitive_in_schemas("users", "fiscal_code", &["private"])
        .build();
    let plan = validate(
        "SELECT u.eye_color, u.fiscal_code FROM private.users u WHERE u.id = 1 LIMIT 10;",
        &profile,
    )
    .expect("should accept");
    assert_eq!(
        plan,
        vec![PlanEntry::Plaintext, PlanEntry::Token { source_col_id: "private.users.fiscal_code".to_string() }]
    );
}

#[test]
fn rejects_wildcard_select() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT u.* FROM users u;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::Star);
}

#[test]
fn rejects_sensitive_column_compared_to_literal() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let err = Validator::new()
        .validate(ValidateRequest {
            profile: &profile,
            sql: "SELECT u.id FROM users u WHERE u.fiscal_code = 'ABC' LIMIT 200;",
        })
        .unwrap_err();
    assert_eq!(err.code, VerrCode::SensitiveCmp);
    assert!(err.message.contains("u.fiscal_code"), "message was: {}", err.message);
}

#[test]
fn rejects_left_join() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate(
        "SELECT u.id FROM users u LEFT JOIN expenses e ON e.user_id = u.id WHERE u.fiscal_code = $1 LIMIT 10;",
        &profile,
    )
    .unwrap_err();
    assert_eq!(code, VerrCode::JoinNotInner);
}

#[test]
fn rejects_sensitive_column_leaked_through_cte() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate(
        "WITH t AS (SELECT u.fiscal_code FROM users u WHERE u.id = 1) SELECT t.fiscal_code FROM t LIMIT 10;",
        &profile,
    )
    .unwrap_err();
    assert_eq!(code, VerrCode::SensitiveOutsideMain);
}

#[test]
fn rejects_sensitive_column_leaked_through_scalar_subquery() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate(
        "SELECT u.id, (SELECT s.fiscal_code FROM users s WHERE s.id = u.id) FROM users u LIMIT 10;",
        &profile,
    )
    .unwrap_err();
    assert_eq!(code, VerrCode::SensitiveOutsideMain);
}

#[test]
fn rejects_sensitive_column_leaked_through_in_subquery() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate(
        "SELECT u.id FROM users u WHERE u.id IN (SELECT s.id FROM users s WHERE s.fiscal_code = $1) LIMIT 10;",
        &profile,
    )
    .unwrap_err();
    assert_eq!(code, VerrCode::SensitiveOutsideMain);
}

#[test]
fn rejects_limit_over_policy_max_rows() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").max_rows(200).build();
    let code = validate("SELECT u.fiscal_code FROM users u LIMIT 201;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::LimitExceeds);
}

#[test]
fn rejects_missing_table_alias() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT 1 FROM (SELECT 1) WHERE true;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::NoTableAlias);
}

#[test]
fn rejects_unresolved_column_qualifier() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT z.id FROM users u;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::NoColumnAlias);
}

#[test]
fn rejects_non_equality_join_on_clause() {
    let profile = PolicyFixture::new().build();
    let code =
        validate("SELECT u.id FROM users u JOIN expenses e ON e.user_id > u.id LIMIT 10;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::JoinOnInvalid);
}

#[test]
fn rejects_join_on_sensitive_equality() {
    let profile = PolicyFixture::new().sensitive("expenses", "user_id").build();
    let code =
        validate("SELECT u.id FROM users u JOIN expenses e ON e.user_id = u.id LIMIT 10;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::JoinOnSensitive);
}

#[test]
fn rejects_unsafe_function_call() {
    let profile = PolicyFixture::new().safe_function("lower").build();
    let code = validate("SELECT upper(u.name) FROM users u LIMIT 10;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::FuncUnsafe);
}

#[test]
fn rejects_sensitive_column_wrapped_in_select_expression() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").safe_function("upper").build();
    let code = validate("SELECT upper(u.fiscal_code) FROM users u LIMIT 10;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::SensitiveSelectExpr);
}

#[test]
fn rejects_sensitive_column_in_order_by() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate("SELECT u.id FROM users u ORDER BY u.fiscal_code LIMIT 10;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::SensitiveLoc);
}

#[test]
fn rejects_sensitive_column_referenced_only_in_window_over_clause() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").safe_function("first_value").build();
    let code = validate(
        "SELECT first_value(u.name) OVER (ORDER BY u.fiscal_code) FROM users u LIMIT 10;",
        &profile,
    )
    .unwrap_err();
    assert_eq!(code, VerrCode::SensitiveSelectExpr);
}

#[test]
fn rejects_where_disjunction() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT u.id FROM users u WHERE u.id = 1 OR u.id = 2;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::WhereNotConj);
}

#[test]
fn rejects_param_in_select_list() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT $1 FROM users u WHERE u.id = 1;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::ParamOutsideWhere);
}

#[test]
fn rejects_param_bound_to_non_sensitive_column() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT u.id FROM users u WHERE u.id = $1;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::ParamNonSensitive);
}

#[test]
fn rejects_distinct_over_sensitive_column() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate("SELECT DISTINCT u.fiscal_code FROM users u LIMIT 10;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::DistinctSensitive);
}

#[test]
fn rejects_offset_over_sensitive_column() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate("SELECT u.fiscal_code FROM users u LIMIT 10 OFFSET 5;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::OffsetSensitive);
}

#[test]
fn rejects_missing_limit_on_sensitive_query() {
    let profile = PolicyFixture::new().sensitive("users", "fiscal_code").build();
    let code = validate("SELECT u.fiscal_code FROM users u;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::LimitRequired);
}

#[test]
fn rejects_unparseable_sql() {
    let profile = PolicyFixture::new().build();
    let code = validate("SELECT FROM FROM;;;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::ParseFail);
}

#[test]
fn rejects_unsupported_statement_kind() {
    let profile = PolicyFixture::new().build();
    let code = validate("DELETE FROM users WHERE id = 1;", &profile).unwrap_err();
    assert_eq!(code, VerrCode::UnsupportedQuery);
}

#[test]
fn accepts_deterministic_strategy_profile_without_affecting_validation() {
    // The validator never consults `column_strategy` directly — the field
    // only feeds the Token Store, which the validator does not depend on.
    let profile = PolicyFixture::new().strategy(ColumnStrategy::Randomized).build();
    let plan = validate("SELECT u.id FROM users u WHERE u.id = 1 LIMIT 5;", &profile).expect("should accept");
    assert_eq!(plan, vec![PlanEntry::Plaintext]);
}
