//! squall: an embedded SQL/PPL query engine core.
//!
//! The pipeline takes an unresolved syntax tree (produced by an external
//! parser), analyzes it into a typed logical plan, optimizes that plan with
//! rewrite rules, asks the storage layer to compile it into a physical
//! operator tree, and streams result tuples through a pull-based iterator
//! model.
//!
//! Pipeline: AST -> Analyzer -> LogicalPlan -> Optimizer -> Table::implement
//! -> PhysicalPlan -> ExecutionEngine -> rows.

pub mod analyzer;
pub mod ast;
pub mod data;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expression;
pub mod planner;
pub mod service;
pub mod storage;
