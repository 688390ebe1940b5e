pub mod threaded_swap_executor;
