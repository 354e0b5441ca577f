pub mod column_packet;
pub mod end_of_file_packet;
pub mod error_packet;
pub mod handshake_packet;
pub mod len_enc;
pub mod ok_packet;
pub mod packet_channel;
pub mod prepare_packet;
pub mod result_set_row_packet;
