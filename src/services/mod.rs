pub mod transition_api;
