pub mod clear_cache;
pub mod doctor;
pub mod run;
pub mod show_graph;
