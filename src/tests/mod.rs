// Test modules for domtrie

#[cfg(test)]
pub mod name_tests;



#[cfg(test)]
pub mod qp_store_tests;

#[cfg(test)]
pub mod qp_cursor_tests;



#[cfg(test)]
pub mod stats_tests;
