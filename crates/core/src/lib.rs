pub mod ffmpeg_runtime;

pub mod shared {
    pub mod constants;
    pub mod encoded_packet;
    pub mod error;
    pub mod planar_frame;
    pub mod rational;
    pub mod raw_frame;
    pub mod session_config;
    pub mod stream_descriptor;
}

pub mod capture {
    pub mod domain {
        pub mod frame_preview;
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod conversion {
    pub mod domain {
        pub mod pixel_converter;
    }
    pub mod infrastructure;
}

pub mod encoding {
    pub mod domain {
        pub mod encoder_session;
    }
    pub mod infrastructure;
}

pub mod container {
    pub mod domain {
        pub mod container_writer;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod encode_stage;
    pub mod pipeline_executor;
    pub mod pipeline_logger;
    pub mod record_use_case;
    pub mod session_summary;

    pub mod infrastructure {
        pub mod sequential_pipeline_executor;
        pub mod threaded_pipeline_executor;
    }

    #[cfg(test)]
    pub(crate) mod test_support;
}
