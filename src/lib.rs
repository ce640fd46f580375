//! # joinscan
//!
//! A library for discovering the join topology of hand-written analytical SQL and
//! turning it into referential-integrity checks.
//!
//! # Features
//!
//! - Lexical, single pass join extraction: no full SQL grammar required.
//! - Tracks table aliases and chains `FROM a JOIN b ... JOIN c ...` left to right.
//! - Normalizes join kinds (`INNER`, `LEFT`, `LEFT OUTER`, `RIGHT`, `FULL`).
//! - Extracts ordered equality keys, looking through `TRIM`, `UPPER`, `LOWER` and `CAST`.
//! - Flags conditions it cannot turn into keys instead of guessing.
//! - Plans anti-join, multiplicity, null-key and spot-check queries for each join.
//!
//! # Example
//!
//! ```rust
//! use joinscan::{ast::JoinType, cleaner::clean, parser::extract_joins};
//!
//! let sql = r#"
//!     select o.id, c.name
//!     from sales.public.orders o
//!     left join sales.public.customers c on trim(o.customer_id) = c.id
//!     where o.amount > 0
//! "#;
//! let joins = extract_joins(&clean(sql));
//! assert_eq!(joins.len(), 1);
//! assert_eq!(joins[0].left_table, "sales.public.orders");
//! assert_eq!(joins[0].join_type, JoinType::Left);
//! assert_eq!(joins[0].left_keys, vec!["customer_id"]);
//! assert_eq!(joins[0].right_keys, vec!["id"]);
//! ```
pub mod ast;
pub mod binder;
pub mod catalog;
pub mod cleaner;
pub mod condition;
pub mod config;
pub mod parser;
pub mod report;
pub mod scanner;
pub mod test_utils;
pub mod validation;
