// Purpose - the audio backend behind the ClickSink seam

pub mod output;
