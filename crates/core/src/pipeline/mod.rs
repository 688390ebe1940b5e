pub mod admission_gate;
pub mod frame_processor;
pub mod infrastructure;
pub mod ordered_writer;
pub mod pipeline_executor;
pub mod pipeline_logger;
pub mod preview_frame_use_case;
pub mod swap_image_use_case;
pub mod swap_video_use_case;
