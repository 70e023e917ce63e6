mod common;
mod product_tests;
